//! Lifecycle Walker
//!
//! Depth-first traversal of a built [`Tree`], translating every failure into
//! an event at the nearest lifecycle boundary (test, describe or suite).
//!
//! ```text
//! SuiteStart
//!   DescribeStart            (only when the describe has an enabled test)
//!     TestStart .. TestEnd   (one per enabled test, via a TestExecutor)
//!   DescribeEnd
//! SuiteEnd
//! ```

use crate::allocator::{HeapProbe, MemoryProbe};
use crate::context::TestContext;
use crate::error::Error;
use crate::filter::NameFilter;
use crate::hooks::{Outcome, catch, run_hook};
use crate::tree::{BuildMode, NodeId, NodeKind, Runtime, Tree};
use pacebench_ipc::{EventSink, LifecycleEvent, TestOptions};
use tracing::debug;

/// Runs one enabled test of a tree
pub trait TestExecutor {
    /// How the tree must be built for this executor
    fn build_mode(&self) -> BuildMode {
        BuildMode::Full
    }

    /// Run `test`, emitting its `TestStart` .. `TestEnd` events
    fn execute(&mut self, tree: &mut Tree, test: NodeId, sink: &mut dyn EventSink);
}

/// Runs tests in the current process
#[derive(Debug, Default)]
pub struct InProcessExecutor<P: MemoryProbe = HeapProbe> {
    probe: P,
}

impl InProcessExecutor {
    /// Executor reading the tracking allocator
    pub fn new() -> Self {
        Self { probe: HeapProbe }
    }
}

impl<P: MemoryProbe> InProcessExecutor<P> {
    /// Executor with a custom heap probe
    pub fn with_probe(probe: P) -> Self {
        Self { probe }
    }
}

impl<P: MemoryProbe> TestExecutor for InProcessExecutor<P> {
    fn execute(&mut self, tree: &mut Tree, test: NodeId, sink: &mut dyn EventSink) {
        run_test(tree, test, &self.probe, sink);
    }
}

/// Declare a suite and walk it.
///
/// A declaration failure outside any describe is reported as a
/// `FatalError` and no test of the suite runs.
pub fn run_suite<F, O>(
    name: &str,
    declare: F,
    filter: &NameFilter,
    options: &TestOptions,
    executor: &mut dyn TestExecutor,
    sink: &mut dyn EventSink,
) where
    F: FnOnce(&mut Runtime) -> O,
    O: Outcome,
{
    let mode = executor.build_mode();
    match Tree::build(name, mode, filter.clone(), options.clone(), declare) {
        Ok(mut tree) => walk(&mut tree, executor, sink),
        Err(error) => {
            debug!(suite = name, %error, "suite declaration failed");
            sink.emit(LifecycleEvent::FatalError {
                message: format!("suite `{name}` failed to declare: {error}"),
            });
        }
    }
}

/// Walk a built tree, running every enabled test in declaration order
pub fn walk(tree: &mut Tree, executor: &mut dyn TestExecutor, sink: &mut dyn EventSink) {
    let name = tree.name().to_string();
    sink.emit(LifecycleEvent::SuiteStart { name: name.clone() });

    let children = tree.node(tree.root()).children().to_vec();
    for child in children {
        visit(tree, child, executor, sink);
    }

    sink.emit(LifecycleEvent::SuiteEnd { name });
}

fn visit(tree: &mut Tree, id: NodeId, executor: &mut dyn TestExecutor, sink: &mut dyn EventSink) {
    let node = tree.node(id);
    match node.kind() {
        NodeKind::Describe => {
            let name = node.name().to_string();

            if let Some(error) = node.error() {
                let message = error.to_string();
                sink.emit(LifecycleEvent::DescribeStart { name: name.clone() });
                sink.emit(LifecycleEvent::Error { message });
                sink.emit(LifecycleEvent::DescribeEnd { name });
                return;
            }
            if !tree.has_enabled_tests(id) {
                return;
            }

            sink.emit(LifecycleEvent::DescribeStart { name: name.clone() });
            let children = node.children().to_vec();
            for child in children {
                visit(tree, child, executor, sink);
            }
            sink.emit(LifecycleEvent::DescribeEnd { name });
        }
        NodeKind::Test if node.is_enabled() => {
            debug!(test = node.name(), location = ?tree.location(id), "running test");
            executor.execute(tree, id, sink);
        }
        NodeKind::Test | NodeKind::Suite => {}
    }
}

/// Run one test: `beforeEach`, body (with its measurements), `afterEach`.
///
/// Any failure is reported as an `Error` event; `TestEnd` is always emitted
/// with whatever samples were collected.
pub fn run_test(tree: &mut Tree, id: NodeId, probe: &dyn MemoryProbe, sink: &mut dyn EventSink) {
    let node = tree.node(id);
    let name = node.name().to_string();
    let hooks = node.hooks().clone();
    let options = node.options().clone();
    let location = tree.location(id);
    let body = tree.take_body(id);

    sink.emit(LifecycleEvent::TestStart {
        name: name.clone(),
        location,
    });

    let mut ctx = TestContext::new(hooks.clone(), options, probe, sink);
    let result = run_hook(&hooks.before_each)
        .and_then(|()| {
            let body = body.ok_or_else(|| Error::MissingBody(name.clone()))?;
            let outcome = catch(|| body(&mut ctx));
            // A hook failure inside a measurement wins over whatever the
            // body made of it
            match ctx.take_failure() {
                Some(failure) => Err(failure),
                None => outcome,
            }
        })
        .and_then(|()| run_hook(&hooks.after_each));
    let (duration, memory) = ctx.finish();

    if let Err(error) = result {
        debug!(test = %name, %error, "test failed");
        sink.emit(LifecycleEvent::Error {
            message: error.to_string(),
        });
    }

    sink.emit(LifecycleEvent::TestEnd {
        name,
        duration: duration.stats(),
        memory: memory.stats(),
    });
}

/// Rebuild a suite following `location` and run the test found there.
///
/// Used by worker processes. Returns an error when the location does not
/// address a test or a describe on the path failed to declare.
pub fn resume<F, O>(
    name: &str,
    declare: F,
    location: &[u32],
    options: &TestOptions,
    probe: &dyn MemoryProbe,
    sink: &mut dyn EventSink,
) -> Result<(), Error>
where
    F: FnOnce(&mut Runtime) -> O,
    O: Outcome,
{
    let mut tree = Tree::build(
        name,
        BuildMode::Resume(location.to_vec()),
        NameFilter::all(),
        options.clone(),
        declare,
    )?;

    let invalid = || Error::InvalidLocation(location.to_vec());
    let mut id = tree.root();
    for &index in location {
        if let Some(error) = tree.node(id).error() {
            return Err(Error::Failed(format!(
                "describe `{}` failed: {error}",
                tree.node(id).name()
            )));
        }
        id = *tree.node(id).children().get(index as usize).ok_or_else(invalid)?;
    }
    if location.is_empty() || tree.node(id).kind() != NodeKind::Test {
        return Err(invalid());
    }

    run_test(&mut tree, id, probe, sink);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn quick() -> TestOptions {
        TestOptions::new()
            .with_measure_timeout(-1.0)
            .with_warmup_iteration_count(1)
            .with_batch_intermission_timeout(0.0)
    }

    fn walk_suite<F>(filter: NameFilter, declare: F) -> Vec<LifecycleEvent>
    where
        F: FnOnce(&mut Runtime),
    {
        let mut events = Vec::new();
        let mut executor = InProcessExecutor::new();
        run_suite("suite", declare, &filter, &quick(), &mut executor, &mut events);
        events
    }

    fn lifecycle(events: &[LifecycleEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                LifecycleEvent::SuiteStart { name } => Some(format!("suite+ {name}")),
                LifecycleEvent::SuiteEnd { name } => Some(format!("suite- {name}")),
                LifecycleEvent::DescribeStart { name } => Some(format!("describe+ {name}")),
                LifecycleEvent::DescribeEnd { name } => Some(format!("describe- {name}")),
                LifecycleEvent::TestStart { name, .. } => Some(format!("test+ {name}")),
                LifecycleEvent::TestEnd { name, .. } => Some(format!("test- {name}")),
                LifecycleEvent::Error { message } => Some(format!("error {message}")),
                LifecycleEvent::FatalError { message } => Some(format!("fatal {message}")),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_full_walk_order() {
        let events = walk_suite(NameFilter::all(), |rt| {
            rt.describe("outer", |rt| {
                rt.test("a", |ctx| ctx.measure(|| {}));
                rt.describe("inner", |rt| {
                    rt.test("b", |ctx| ctx.measure(|| {}));
                });
            });
            rt.test("c", |_| {});
        });

        assert_eq!(
            lifecycle(&events),
            vec![
                "suite+ suite",
                "describe+ outer",
                "test+ a",
                "test- a",
                "describe+ inner",
                "test+ b",
                "test- b",
                "describe- inner",
                "describe- outer",
                "test+ c",
                "test- c",
                "suite- suite",
            ]
        );
    }

    #[test]
    fn test_filtered_describe_is_silent() {
        let events = walk_suite(NameFilter::new(&["^keep$"]).unwrap(), |rt| {
            rt.describe("skipped", |rt| {
                rt.test("other", |_| {});
            });
            rt.test("keep", |_| {});
        });

        assert_eq!(
            lifecycle(&events),
            vec!["suite+ suite", "test+ keep", "test- keep", "suite- suite"]
        );
    }

    #[test]
    fn test_multiple_measures_merge() {
        let events = walk_suite(NameFilter::all(), |rt| {
            rt.test("twice", |ctx| {
                ctx.measure(|| {})?;
                ctx.measure(|| {})
            });
        });

        let sizes: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                LifecycleEvent::TestEnd { duration, .. } => Some(duration.size),
                _ => None,
            })
            .collect();
        assert_eq!(sizes, vec![2]);
    }

    #[test]
    fn test_before_each_failure_ends_test_without_samples() {
        let events = walk_suite(NameFilter::all(), |rt| {
            rt.before_each(|| Err::<(), _>("database unavailable"));
            rt.test("query", |ctx| ctx.measure(|| {}));
        });

        assert_eq!(
            lifecycle(&events),
            vec![
                "suite+ suite",
                "test+ query",
                "error database unavailable",
                "test- query",
                "suite- suite",
            ]
        );
        assert!(matches!(
            &events[events.len() - 2],
            LifecycleEvent::TestEnd { duration, .. } if duration.size == 0
        ));
    }

    #[test]
    fn test_hook_failure_in_measure_is_reported_once() {
        let events = walk_suite(NameFilter::all(), |rt| {
            rt.before_batch(|| Err::<(), _>("no fixture"));
            rt.test("t", |ctx| {
                // The body ignores the first result and measures again
                let _ = ctx.measure(|| {});
                ctx.measure(|| {})
            });
        });

        let errors: Vec<_> = lifecycle(&events)
            .into_iter()
            .filter(|e| e.starts_with("error"))
            .collect();
        assert_eq!(errors, vec!["error no fixture"]);
    }

    #[test]
    fn test_describe_failure_skips_subtree_only() {
        let events = walk_suite(NameFilter::all(), |rt| {
            rt.describe("broken", |rt| -> Result<(), String> {
                rt.test("never", |_| {});
                panic!("bad fixture")
            });
            rt.test("sibling", |_| {});
        });

        assert_eq!(
            lifecycle(&events),
            vec![
                "suite+ suite",
                "describe+ broken",
                "error bad fixture",
                "describe- broken",
                "test+ sibling",
                "test- sibling",
                "suite- suite",
            ]
        );
    }

    #[test]
    fn test_top_level_failure_is_fatal() {
        let events = walk_suite(NameFilter::all(), |_| panic!("cannot open corpus"));
        assert_eq!(
            lifecycle(&events),
            vec!["fatal suite `suite` failed to declare: cannot open corpus"]
        );
    }

    #[test]
    fn test_each_hooks_wrap_body() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (before, after, body) = (Rc::clone(&log), Rc::clone(&log), Rc::clone(&log));

        walk_suite(NameFilter::all(), move |rt| {
            rt.before_each(move || before.borrow_mut().push("before_each"));
            rt.after_each(move || after.borrow_mut().push("after_each"));
            rt.test("t", move |ctx| {
                body.borrow_mut().push("body");
                ctx.measure(|| {})
            });
        });

        assert_eq!(*log.borrow(), vec!["before_each", "body", "after_each"]);
    }

    #[test]
    fn test_resume_runs_exactly_one_body() {
        let ran = Rc::new(RefCell::new(Vec::new()));
        let declare = |ran: Rc<RefCell<Vec<&'static str>>>| {
            move |rt: &mut Runtime| {
                for (describe, tests) in [("x", ["x1", "x2"]), ("y", ["y1", "y2"])] {
                    let ran = Rc::clone(&ran);
                    rt.describe(describe, move |rt| {
                        for test in tests {
                            let ran = Rc::clone(&ran);
                            rt.test(test, move |_| ran.borrow_mut().push(test));
                        }
                    });
                }
            }
        };

        // Locate in a shape-only build, then resume from scratch
        let tree = Tree::build(
            "suite",
            BuildMode::Discover,
            NameFilter::all(),
            quick(),
            declare(Rc::clone(&ran)),
        )
        .unwrap();
        let target = tree.enabled_tests()[2];
        let location = tree.location(target);
        assert_eq!(location, vec![1, 0]);
        assert!(ran.borrow().is_empty());

        let mut events = Vec::new();
        let declare_again = declare(Rc::clone(&ran));
        resume("suite", declare_again, &location, &quick(), &HeapProbe, &mut events).unwrap();

        assert_eq!(*ran.borrow(), vec!["y1"]);
        assert_eq!(
            events.first(),
            Some(&LifecycleEvent::TestStart {
                name: "y1".to_string(),
                location: vec![1, 0]
            })
        );
    }

    #[test]
    fn test_resume_invalid_location() {
        let declare = |rt: &mut Runtime| {
            rt.describe("d", |rt| rt.test("t", |_| {}));
        };
        let mut events = Vec::new();

        for location in [vec![], vec![0], vec![3], vec![0, 0, 0]] {
            let result = resume("suite", declare, &location, &quick(), &HeapProbe, &mut events);
            assert!(matches!(result, Err(Error::InvalidLocation(_))), "{location:?}");
        }
        assert!(events.is_empty());
    }
}
