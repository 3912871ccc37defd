//! cubetool applications.
//!
//! Every application declares its parameters as an [`AppDefinition`] and
//! runs against parsed [`Parameters`]. Text results go to the writer in
//! the [`AppContext`] so the binary can print them and tests can capture
//! them.

pub mod apps;

use cube_common::{AppDefinition, CubeError, Parameters, Preferences, Result};
use cube_store::{AccessMode, Cube};
use pipeline::OutputOptions;
use std::io::Write;
use std::path::Path;

/// What an application gets besides its parameters.
pub struct AppContext<'a> {
    pub prefs: &'a Preferences,
    pub out: &'a mut dyn Write,
}

impl AppContext<'_> {
    /// Open a cube read-only with the session's cache budget.
    pub fn open_cube(&self, path: &Path) -> Result<Cube> {
        Cube::open_with(path, AccessMode::Read, self.prefs)
    }

    /// Open an auxiliary cube, looking under the data directory when the
    /// path does not exist as given.
    pub fn open_data_cube(&self, path: &Path) -> Result<Cube> {
        self.open_cube(&self.prefs.data_file(path))
    }

    /// Output options carrying the session's label reservation.
    pub fn output_options(&self) -> OutputOptions {
        OutputOptions::default().with_preferences(self.prefs)
    }
}

type RunFn = fn(&Parameters, &mut AppContext<'_>) -> Result<()>;

/// A runnable application.
pub struct App {
    pub definition: AppDefinition,
    run: RunFn,
}

impl App {
    pub fn new(definition: AppDefinition, run: RunFn) -> Self {
        Self { definition, run }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Parse `KEY=VALUE` arguments and run.
    pub fn execute<S: AsRef<str>>(&self, args: &[S], ctx: &mut AppContext<'_>) -> Result<()> {
        let params = self.definition.parse(args)?;
        (self.run)(&params, ctx)
    }
}

/// Every application, in usage order.
pub fn registry() -> Vec<App> {
    let mut apps = apps::import::apps();
    apps.extend(apps::calibrate::apps());
    apps.push(apps::grid::app());
    apps.push(apps::dskinfo::app());
    apps.push(apps::labels::app());
    apps.push(apps::mosaic::app());
    apps
}

pub fn find(name: &str) -> Result<App> {
    registry()
        .into_iter()
        .find(|a| a.name().eq_ignore_ascii_case(name))
        .ok_or_else(|| CubeError::user(format!("unknown application '{}'", name)))
}

/// Run `name` with `args`, writing text output to `out`.
pub fn run<S: AsRef<str>>(name: &str, args: &[S], prefs: &Preferences, out: &mut dyn Write) -> Result<()> {
    let app = find(name)?;
    let mut ctx = AppContext { prefs, out };
    app.execute(args, &mut ctx)
}

pub(crate) fn write_out(out: &mut dyn Write, text: &str) -> Result<()> {
    out.write_all(text.as_bytes())
        .map_err(|e| CubeError::io("<stdout>", e))
}
