// tests/task_properties.rs

use std::collections::BTreeMap;

use proptest::prelude::*;
use taskstream::Task;

fn word() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_./-]{1,12}"
}

// Path components compare structurally ("a/" == "a"), so paths stay single-segment.
fn path_segment() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_-]{1,12}"
}

fn env_strategy() -> impl Strategy<Value = Option<BTreeMap<String, String>>> {
    proptest::option::of(proptest::collection::btree_map(
        "[A-Z_]{1,8}",
        "[a-z0-9]{0,8}",
        0..4,
    ))
}

#[derive(Debug, Clone)]
struct Parts {
    program: String,
    args: Vec<String>,
    cwd: Option<String>,
    env: Option<BTreeMap<String, String>>,
}

impl Parts {
    fn task(&self) -> Task {
        let mut task = Task::new(&self.program).args(self.args.iter().cloned());
        if let Some(ref cwd) = self.cwd {
            task = task.current_dir(cwd);
        }
        if let Some(ref env) = self.env {
            task = task.envs(env.clone());
        }
        task
    }
}

fn parts_strategy() -> impl Strategy<Value = Parts> {
    (
        path_segment(),
        proptest::collection::vec(word(), 0..4),
        proptest::option::of(path_segment()),
        env_strategy(),
    )
        .prop_map(|(program, args, cwd, env)| Parts {
            program,
            args,
            cwd,
            env,
        })
}

proptest! {
    #[test]
    fn identical_parts_make_equal_tasks(parts in parts_strategy()) {
        prop_assert_eq!(parts.task(), parts.task());
    }

    #[test]
    fn equality_follows_every_field(a in parts_strategy(), b in parts_strategy()) {
        let same = a.program == b.program
            && a.args == b.args
            && a.cwd == b.cwd
            && a.env == b.env;
        prop_assert_eq!(a.task() == b.task(), same);
    }

    #[test]
    fn command_is_space_joined_program_and_args(parts in parts_strategy()) {
        let expected = std::iter::once(parts.program.clone())
            .chain(parts.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        prop_assert_eq!(parts.task().command(), expected);
    }
}
