use std::io;
use std::path::{Path, PathBuf};

use scrape_logging::scrape_info;
use tokio::process::Command;

/// Target dataset format for the conversion tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFormat {
    /// Driver name passed to `-f`.
    pub driver: String,
    /// Extension of the main output file, including the dot.
    pub extension: String,
}

impl OutputFormat {
    pub fn shapefile() -> Self {
        Self::new("ESRI Shapefile", ".shp")
    }

    pub fn geopackage() -> Self {
        Self::new("GPKG", ".gpkg")
    }

    pub fn geojson() -> Self {
        Self::new("GeoJSON", ".geojson")
    }

    pub fn new(driver: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            extension: extension.into(),
        }
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::shapefile()
    }
}

/// Exit status and diagnostics of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    pub status_code: Option<i32>,
    pub stderr: String,
}

/// External geospatial conversion tool.
#[async_trait::async_trait]
pub trait ConversionTool: Send + Sync {
    /// Converts `input` into `output`. With `append`, features are added to
    /// an existing dataset instead of creating it.
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        format: &OutputFormat,
        append: bool,
    ) -> io::Result<ToolOutput>;
}

/// Runs `ogr2ogr` as a subprocess.
#[derive(Debug, Clone)]
pub struct Ogr2Ogr {
    binary: PathBuf,
}

impl Ogr2Ogr {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    fn args(input: &Path, output: &Path, format: &OutputFormat, append: bool) -> Vec<String> {
        let mut args = vec!["-f".to_string(), format.driver.clone()];
        if append {
            args.push("-update".to_string());
            args.push("-append".to_string());
        }
        args.push(output.display().to_string());
        args.push(input.display().to_string());
        args
    }
}

impl Default for Ogr2Ogr {
    fn default() -> Self {
        Self::new(PathBuf::from("ogr2ogr"))
    }
}

#[async_trait::async_trait]
impl ConversionTool for Ogr2Ogr {
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        format: &OutputFormat,
        append: bool,
    ) -> io::Result<ToolOutput> {
        let args = Self::args(input, output, format, append);
        scrape_info!("Running command: {} {}", self.binary.display(), args.join(" "));

        let result = command(&self.binary, &args).output().await?;
        scrape_info!("Process finished, status code: {:?}", result.status.code());

        Ok(ToolOutput {
            success: result.status.success(),
            status_code: result.status.code(),
            stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
        })
    }
}

/// A stopped job drops the pending future; the tool must not outlive it.
fn command(binary: &Path, args: &[String]) -> Command {
    let mut command = Command::new(binary);
    command.args(args).kill_on_drop(true);
    command
}
