//! Suite and setup registry
//!
//! `#[pacebench::suite]` and `#[pacebench::setup]` submit their declaration
//! functions here at link time.

use crate::error::Error;
use crate::tree::Runtime;

/// A declaration function
pub type DeclareFn = fn(&mut Runtime);

/// Suite registered via `#[pacebench::suite]`
#[derive(Debug, Clone)]
pub struct SuiteDef {
    /// Unique suite name
    pub name: &'static str,
    /// Declares the suite's describes and tests
    pub declare: DeclareFn,
    /// Source file path
    pub file: &'static str,
    /// Source line number
    pub line: u32,
    /// Module path
    pub module_path: &'static str,
}

/// Setup registered via `#[pacebench::setup]`.
///
/// Setups are declared on the suite root before the suite itself, so their
/// hooks and options apply to every test.
#[derive(Debug, Clone)]
pub struct SetupDef {
    /// Unique setup name
    pub name: &'static str,
    /// Registers hooks and options on the suite root
    pub declare: DeclareFn,
    /// Source file path
    pub file: &'static str,
    /// Source line number
    pub line: u32,
}

inventory::collect!(SuiteDef);
inventory::collect!(SetupDef);

/// Anchor to prevent LTO from stripping inventory entries
#[used]
#[doc(hidden)]
pub static REGISTRY_ANCHOR: fn() = || {
    for _ in inventory::iter::<SuiteDef> {}
    for _ in inventory::iter::<SetupDef> {}
};

/// Registered suites in source order (file, then line)
pub fn suites() -> Vec<&'static SuiteDef> {
    let mut suites: Vec<_> = inventory::iter::<SuiteDef>.into_iter().collect();
    suites.sort_by(|a, b| (a.file, a.line, a.name).cmp(&(b.file, b.line, b.name)));
    suites
}

/// Registered setups by name
pub fn setups() -> Vec<&'static SetupDef> {
    let mut setups: Vec<_> = inventory::iter::<SetupDef>.into_iter().collect();
    setups.sort_by_key(|s| s.name);
    setups
}

/// A suite together with the setups declared before it
#[derive(Debug, Clone)]
pub struct SuitePlan {
    /// Suite to declare
    pub suite: &'static SuiteDef,
    /// Setups to declare first, in order
    pub setups: Vec<&'static SetupDef>,
}

impl SuitePlan {
    /// Look up a suite and its setups by registered name
    pub fn resolve<S: AsRef<str>>(suite: &str, setups: &[S]) -> Result<Self, Error> {
        let suite = inventory::iter::<SuiteDef>
            .into_iter()
            .find(|s| s.name == suite)
            .ok_or_else(|| Error::UnknownSuite(suite.to_string()))?;
        let setups = setups
            .iter()
            .map(|name| {
                let name = name.as_ref();
                inventory::iter::<SetupDef>
                    .into_iter()
                    .find(|s| s.name == name)
                    .ok_or_else(|| Error::UnknownSetup(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { suite, setups })
    }

    /// Suite name
    pub fn name(&self) -> &'static str {
        self.suite.name
    }

    /// Setup names, in declaration order
    pub fn setup_names(&self) -> Vec<String> {
        self.setups.iter().map(|s| s.name.to_string()).collect()
    }

    /// Declare setups, then the suite
    pub fn declare(&self, rt: &mut Runtime) {
        for setup in &self.setups {
            (setup.declare)(rt);
        }
        (self.suite.declare)(rt);
    }
}
