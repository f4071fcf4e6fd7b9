//! Region extraction through the external `osmconvert` tool.
//!
//! With a clip file the polygons are first written as a `.poly` filter next
//! to the output. Failures are reported to the caller and never touch the
//! export pipeline.

use std::io::{self, BufWriter, Write};
use std::process::{Command, ExitStatus};

use camino::{Utf8Path, Utf8PathBuf};
use log::{error, info};
use pbfcut_core::poly::write_poly;
use pbfcut_core::{BoundarySource, BoundingBox, PolyError};
use thiserror::Error;

use crate::boundary::{BoundaryLayer, BoundaryReadError, read_boundary_layer};

/// Program name used when no explicit path is configured.
pub const DEFAULT_OSMCONVERT: &str = "osmconvert";

/// Errors raised by the extract command.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The clip file could not be read.
    #[error(transparent)]
    Boundary(#[from] BoundaryReadError),
    /// The polygon filter could not be written.
    #[error("failed to write polygon filter {path:?}")]
    Poly {
        /// Filter file being written.
        path: Utf8PathBuf,
        /// Serialisation error.
        #[source]
        source: PolyError,
    },
    /// The tool could not be started.
    #[error("failed to launch {program}")]
    Launch {
        /// Program that failed to start.
        program: Utf8PathBuf,
        /// Error reported by the operating system.
        #[source]
        source: io::Error,
    },
    /// The tool ran but reported failure.
    #[error("{program} exited with {status}")]
    Failed {
        /// Program that failed.
        program: Utf8PathBuf,
        /// Exit status it returned.
        status: ExitStatus,
    },
}

/// The spatial filter passed to `osmconvert`.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionFilter {
    /// Copy everything.
    None,
    /// `-B=<file>` with a polygon filter file.
    Polygon(Utf8PathBuf),
    /// `-b=minx,miny,maxx,maxy`.
    BoundingBox(BoundingBox),
}

/// One `osmconvert` run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractRequest {
    /// Source PBF file.
    pub input: Utf8PathBuf,
    /// Destination file.
    pub output: Utf8PathBuf,
    /// Spatial filter.
    pub filter: RegionFilter,
}

impl ExtractRequest {
    /// Scratch file prefix next to the output.
    pub fn temp_prefix(&self) -> Utf8PathBuf {
        output_dir(&self.output).join("osm_temp")
    }

    /// Arguments in the order `osmconvert` expects them.
    ///
    /// # Examples
    /// ```
    /// use pbfcut_data::extract::{ExtractRequest, RegionFilter};
    ///
    /// let request = ExtractRequest {
    ///     input: "planet.osm.pbf".into(),
    ///     output: "out/city.osm.pbf".into(),
    ///     filter: RegionFilter::Polygon("out/city.poly".into()),
    /// };
    /// assert_eq!(
    ///     request.args(),
    ///     vec!["planet.osm.pbf", "-B=out/city.poly", "-o=out/city.osm.pbf", "-t=out/osm_temp"]
    /// );
    /// ```
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![self.input.to_string()];
        match &self.filter {
            RegionFilter::None => {}
            RegionFilter::Polygon(poly) => args.push(format!("-B={poly}")),
            RegionFilter::BoundingBox(bbox) => {
                args.push(format!("-b={}", bbox.to_osmconvert_arg()));
            }
        }
        args.push(format!("-o={}", self.output));
        args.push(format!("-t={}", self.temp_prefix()));
        args
    }
}

/// Handle on the `osmconvert` executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsmConvert {
    program: Utf8PathBuf,
}

impl Default for OsmConvert {
    fn default() -> Self {
        Self::new(DEFAULT_OSMCONVERT)
    }
}

impl OsmConvert {
    /// Use the executable at `program`, or look it up on `PATH` when it is a
    /// bare name.
    pub fn new(program: impl Into<Utf8PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run the tool and wait for it.
    ///
    /// # Errors
    /// Returns [`ExtractError::Launch`] when the process cannot start and
    /// [`ExtractError::Failed`] on a non-zero exit.
    pub fn run(&self, request: &ExtractRequest) -> Result<(), ExtractError> {
        let args = request.args();
        info!("running {} {}", self.program, args.join(" "));
        let status = Command::new(self.program.as_std_path())
            .args(&args)
            .status()
            .map_err(|source| {
                error!("could not launch {}: {source}", self.program);
                ExtractError::Launch {
                    program: self.program.clone(),
                    source,
                }
            })?;
        if status.success() {
            info!("extracted {}", request.output);
            Ok(())
        } else {
            error!("{} exited with {status}", self.program);
            Err(ExtractError::Failed {
                program: self.program.clone(),
                status,
            })
        }
    }
}

/// Write `layer` as `{dir}/{label}.poly`, one entry per source row.
///
/// # Errors
/// Returns [`ExtractError::Poly`] when a geometry is not polygonal or the
/// file cannot be written.
pub fn write_poly_file(layer: &BoundaryLayer, dir: &Utf8Path) -> Result<Utf8PathBuf, ExtractError> {
    let path = dir.join(format!("{}.poly", layer.label));
    let poly_error = |source: PolyError| ExtractError::Poly {
        path: path.clone(),
        source,
    };
    pbfcut_fs::ensure_parent_dir(&path).map_err(|err| poly_error(PolyError::Io(err)))?;
    let file = pbfcut_fs::create_file(&path).map_err(|err| poly_error(PolyError::Io(err)))?;
    let mut writer = BufWriter::new(file);
    write_poly(&mut writer, &layer.label, &layer.geometries).map_err(poly_error)?;
    writer
        .flush()
        .map_err(|err| poly_error(PolyError::Io(err)))?;
    info!(
        "wrote {} boundary geometries to {path}",
        layer.geometries.len()
    );
    Ok(path)
}

/// Build the request for `source`, writing a polygon filter when needed.
///
/// # Errors
/// Returns [`ExtractError`] when the clip file cannot be read or the filter
/// cannot be written.
pub fn prepare_request(
    input: &Utf8Path,
    output: &Utf8Path,
    source: &BoundarySource,
) -> Result<ExtractRequest, ExtractError> {
    let filter = match source {
        BoundarySource::None => RegionFilter::None,
        BoundarySource::BoundingBox(bbox) => RegionFilter::BoundingBox(*bbox),
        BoundarySource::VectorFile { path, layer, .. } => {
            let layer = read_boundary_layer(path, layer.as_deref())?;
            RegionFilter::Polygon(write_poly_file(&layer, &output_dir(output))?)
        }
    };
    Ok(ExtractRequest {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        filter,
    })
}

fn output_dir(output: &Utf8Path) -> Utf8PathBuf {
    output
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .map_or_else(|| Utf8PathBuf::from("."), Utf8Path::to_path_buf)
}
