//! Declaration Tree
//!
//! Suites are declared by running a plain Rust function against a
//! [`Runtime`]. `describe` runs its body immediately with the new node as
//! the current scope; `test` only records its body for the walker.
//!
//! ```ignore
//! fn collections(rt: &mut Runtime) {
//!     rt.before_iteration(|| reset_cache());
//!     rt.describe("vec", |rt| {
//!         rt.test("push", |ctx| ctx.measure(|| push_many()));
//!     });
//! }
//! ```
//!
//! The same declaration function is re-run in every worker process. In
//! resume mode only the describes on the path to the target test execute
//! their bodies, and only the target test keeps its body, so a worker
//! rebuilds just enough of the tree to run one test.

use crate::context::TestContext;
use crate::error::Error;
use crate::filter::NameFilter;
use crate::hooks::{HookKind, LifecycleHooks, Outcome, catch, hook};
use pacebench_ipc::TestOptions;
use tracing::debug;

pub(crate) type TestBody = Box<dyn FnOnce(&mut TestContext<'_>) -> Result<(), Error>>;

/// Index of a node in its [`Tree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Node variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Tree root
    Suite,
    /// Grouping scope
    Describe,
    /// Runnable test
    Test,
}

/// How much of the declaration to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildMode {
    /// Run every describe body and keep every test body
    Full,
    /// Run every describe body, drop test bodies (shape only)
    Discover,
    /// Follow one location; keep only the addressed test's body
    Resume(Vec<u32>),
}

/// Decides, per declaration, whether a describe body runs and whether a
/// test body is kept.
///
/// In path mode `matched` counts the path segments consumed by the
/// describes currently being executed, which is also the depth of the
/// current scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PathCursor {
    Everything { keep_bodies: bool },
    Path { target: Vec<u32>, matched: usize },
}

impl PathCursor {
    pub(crate) fn new(mode: &BuildMode) -> Self {
        match mode {
            BuildMode::Full => PathCursor::Everything { keep_bodies: true },
            BuildMode::Discover => PathCursor::Everything { keep_bodies: false },
            BuildMode::Resume(target) => PathCursor::Path {
                target: target.clone(),
                matched: 0,
            },
        }
    }

    /// A describe at `index` in the current scope is declared; returns
    /// `true` when its body must run. Must be paired with
    /// [`leave_describe`](Self::leave_describe) when it returns `true`.
    pub(crate) fn enter_describe(&mut self, index: u32) -> bool {
        match self {
            PathCursor::Everything { .. } => true,
            PathCursor::Path { target, matched } => {
                let on_path = *matched + 1 < target.len() && target[*matched] == index;
                if on_path {
                    *matched += 1;
                }
                on_path
            }
        }
    }

    pub(crate) fn leave_describe(&mut self) {
        if let PathCursor::Path { matched, .. } = self {
            *matched = matched.saturating_sub(1);
        }
    }

    /// A test at `index` in the current scope is declared; returns `true`
    /// when its body must be kept.
    pub(crate) fn keeps_test(&self, index: u32) -> bool {
        match self {
            PathCursor::Everything { keep_bodies } => *keep_bodies,
            PathCursor::Path { target, matched } => {
                *matched + 1 == target.len() && target[*matched] == index
            }
        }
    }
}

/// A declared scope or test
pub struct Node {
    kind: NodeKind,
    name: String,
    parent: Option<NodeId>,
    index: u32,
    children: Vec<NodeId>,
    options: TestOptions,
    hooks: LifecycleHooks,
    enabled: bool,
    error: Option<Error>,
    body: Option<TestBody>,
}

impl Node {
    /// Node variant
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Declared name (the suite name for the root)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enclosing scope
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Position among the parent's children
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Children in declaration order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Options merged from every enclosing scope
    pub fn options(&self) -> &TestOptions {
        &self.options
    }

    /// Hooks composed from every enclosing scope
    pub fn hooks(&self) -> &LifecycleHooks {
        &self.hooks
    }

    /// Whether a test passed name filtering (always `false` for scopes)
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Failure of a describe body
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Whether the test body was kept in this tree
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("index", &self.index)
            .field("children", &self.children)
            .field("enabled", &self.enabled)
            .field("error", &self.error)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// DSL context handed to declaration functions
pub struct Runtime {
    nodes: Vec<Node>,
    current: NodeId,
    cursor: PathCursor,
    filter: NameFilter,
}

impl Runtime {
    fn new(name: &str, mode: &BuildMode, filter: NameFilter, options: TestOptions) -> Self {
        let root = Node {
            kind: NodeKind::Suite,
            name: name.to_string(),
            parent: None,
            index: 0,
            children: Vec::new(),
            options,
            hooks: LifecycleHooks::default(),
            enabled: false,
            error: None,
            body: None,
        };
        Self {
            nodes: vec![root],
            current: NodeId(0),
            cursor: PathCursor::new(mode),
            filter,
        }
    }

    fn append(&mut self, kind: NodeKind, name: String, options: &TestOptions) -> NodeId {
        let id = NodeId(self.nodes.len());
        let parent = &mut self.nodes[self.current.0];
        let index = parent.children.len() as u32;
        parent.children.push(id);

        let node = Node {
            kind,
            name,
            parent: Some(self.current),
            index,
            children: Vec::new(),
            options: parent.options.overlay(options),
            hooks: parent.hooks.clone(),
            enabled: false,
            error: None,
            body: None,
        };
        self.nodes.push(node);
        id
    }

    fn next_index(&self) -> u32 {
        self.nodes[self.current.0].children.len() as u32
    }

    /// Names of the current scope and its describe ancestors
    fn scope_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut cursor = Some(self.current);
        while let Some(id) = cursor {
            let node = &self.nodes[id.0];
            if node.kind == NodeKind::Describe {
                names.push(node.name.as_str());
            }
            cursor = node.parent;
        }
        names
    }

    /// Declare a nested scope and run its body now
    pub fn describe<F, O>(&mut self, name: impl Into<String>, body: F)
    where
        F: FnOnce(&mut Runtime) -> O,
        O: Outcome,
    {
        self.describe_with(name, TestOptions::default(), body);
    }

    /// Declare a nested scope with option overrides
    pub fn describe_with<F, O>(&mut self, name: impl Into<String>, options: TestOptions, body: F)
    where
        F: FnOnce(&mut Runtime) -> O,
        O: Outcome,
    {
        let index = self.next_index();
        let id = self.append(NodeKind::Describe, name.into(), &options);
        if !self.cursor.enter_describe(index) {
            return;
        }

        let parent = std::mem::replace(&mut self.current, id);
        let result = catch(|| body(self).into_result());
        self.current = parent;
        self.cursor.leave_describe();

        if let Err(error) = result {
            debug!(describe = %self.nodes[id.0].name, %error, "describe body failed");
            self.nodes[id.0].error = Some(error);
        }
    }

    /// Declare a test; its body runs later, in the walker
    pub fn test<F, O>(&mut self, name: impl Into<String>, body: F)
    where
        F: FnOnce(&mut TestContext<'_>) -> O + 'static,
        O: Outcome,
    {
        self.test_with(name, TestOptions::default(), body);
    }

    /// Declare a test with option overrides
    pub fn test_with<F, O>(&mut self, name: impl Into<String>, options: TestOptions, body: F)
    where
        F: FnOnce(&mut TestContext<'_>) -> O + 'static,
        O: Outcome,
    {
        let name = name.into();
        let index = self.next_index();
        let enabled = self
            .filter
            .enables(std::iter::once(name.as_str()).chain(self.scope_names()));

        let id = self.append(NodeKind::Test, name, &options);
        let node = &mut self.nodes[id.0];
        node.enabled = enabled;
        if self.cursor.keeps_test(index) {
            node.body = Some(Box::new(move |ctx: &mut TestContext<'_>| body(ctx).into_result()));
        }
    }

    /// Overlay options on the current scope; applies to scopes and tests
    /// declared afterwards
    pub fn options(&mut self, options: TestOptions) {
        let node = &mut self.nodes[self.current.0];
        node.options = node.options.overlay(&options);
    }

    fn add_hook<F, O>(&mut self, kind: HookKind, f: F)
    where
        F: Fn() -> O + 'static,
        O: Outcome,
    {
        self.nodes[self.current.0].hooks.add(kind, hook(f));
    }

    /// Run before each test of the current scope
    pub fn before_each<F, O>(&mut self, f: F)
    where
        F: Fn() -> O + 'static,
        O: Outcome,
    {
        self.add_hook(HookKind::BeforeEach, f);
    }

    /// Run after each test of the current scope
    pub fn after_each<F, O>(&mut self, f: F)
    where
        F: Fn() -> O + 'static,
        O: Outcome,
    {
        self.add_hook(HookKind::AfterEach, f);
    }

    /// Run before the warmup of each measurement
    pub fn before_warmup<F, O>(&mut self, f: F)
    where
        F: Fn() -> O + 'static,
        O: Outcome,
    {
        self.add_hook(HookKind::BeforeWarmup, f);
    }

    /// Run after the warmup of each measurement
    pub fn after_warmup<F, O>(&mut self, f: F)
    where
        F: Fn() -> O + 'static,
        O: Outcome,
    {
        self.add_hook(HookKind::AfterWarmup, f);
    }

    /// Run before each batch
    pub fn before_batch<F, O>(&mut self, f: F)
    where
        F: Fn() -> O + 'static,
        O: Outcome,
    {
        self.add_hook(HookKind::BeforeBatch, f);
    }

    /// Run after each batch
    pub fn after_batch<F, O>(&mut self, f: F)
    where
        F: Fn() -> O + 'static,
        O: Outcome,
    {
        self.add_hook(HookKind::AfterBatch, f);
    }

    /// Run before each iteration
    pub fn before_iteration<F, O>(&mut self, f: F)
    where
        F: Fn() -> O + 'static,
        O: Outcome,
    {
        self.add_hook(HookKind::BeforeIteration, f);
    }

    /// Run after each iteration
    pub fn after_iteration<F, O>(&mut self, f: F)
    where
        F: Fn() -> O + 'static,
        O: Outcome,
    {
        self.add_hook(HookKind::AfterIteration, f);
    }
}

/// A built declaration tree
#[derive(Debug)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Run a declaration function and collect the resulting tree.
    ///
    /// `options` are the run-wide defaults at the root. A failure outside
    /// any describe is returned as an error; failures inside a describe are
    /// recorded on that describe.
    pub fn build<F, O>(
        name: &str,
        mode: BuildMode,
        filter: NameFilter,
        options: TestOptions,
        declare: F,
    ) -> Result<Tree, Error>
    where
        F: FnOnce(&mut Runtime) -> O,
        O: Outcome,
    {
        let mut runtime = Runtime::new(name, &mode, filter, options);
        catch(|| declare(&mut runtime).into_result())?;
        Ok(Tree {
            nodes: runtime.nodes,
        })
    }

    /// Root node id
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Suite name
    pub fn name(&self) -> &str {
        &self.nodes[0].name
    }

    /// Look up a node
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Child indices from the root to `id`
    pub fn location(&self, id: NodeId) -> Vec<u32> {
        let mut location = Vec::new();
        let mut cursor = id;
        while let Some(parent) = self.nodes[cursor.0].parent {
            location.push(self.nodes[cursor.0].index);
            cursor = parent;
        }
        location.reverse();
        location
    }

    /// Resolve a location to a node
    pub fn find(&self, location: &[u32]) -> Option<NodeId> {
        location.iter().try_fold(self.root(), |id, &index| {
            self.nodes[id.0].children.get(index as usize).copied()
        })
    }

    /// Names from the outermost describe down to `id`, root excluded
    pub fn path_names(&self, id: NodeId) -> Vec<&str> {
        let mut names = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = &self.nodes[current.0];
            if node.kind != NodeKind::Suite {
                names.push(node.name.as_str());
            }
            cursor = node.parent;
        }
        names.reverse();
        names
    }

    /// Whether any enabled test lives under `id`
    pub fn has_enabled_tests(&self, id: NodeId) -> bool {
        let node = &self.nodes[id.0];
        match node.kind {
            NodeKind::Test => node.enabled,
            _ => node.children.iter().any(|&child| self.has_enabled_tests(child)),
        }
    }

    /// Enabled tests in depth-first declaration order
    pub fn enabled_tests(&self) -> Vec<NodeId> {
        let mut tests = Vec::new();
        self.collect_tests(self.root(), &mut tests);
        tests
    }

    fn collect_tests(&self, id: NodeId, out: &mut Vec<NodeId>) {
        let node = &self.nodes[id.0];
        match node.kind {
            NodeKind::Test if node.enabled => out.push(id),
            NodeKind::Test => {}
            _ if node.error.is_some() => {}
            _ => node
                .children
                .iter()
                .for_each(|&child| self.collect_tests(child, out)),
        }
    }

    pub(crate) fn take_body(&mut self, id: NodeId) -> Option<TestBody> {
        self.nodes[id.0].body.take()
    }
}
