//! CSV collaborators: body input records and per-frame result output.
//!
//! The input format is one `name,x,y,vx,vy,mass` row per body, with an
//! optional `SimulationTime,<frames>,<unused>,<G>` row carrying the frame
//! count and a gravitational-constant override.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::Vector2;

use crate::body::Body;

/// Run-level scalars carried by the input file.
#[derive(Clone, Copy, Debug, Default)]
pub struct RunSpec {
    /// Number of frames to simulate; zero when the input has no header row.
    pub frames: usize,
    /// Gravitational constant override, if supplied.
    pub g: Option<f64>,
}

/// Reads the body records and run scalars from `path`.
pub fn read_bodies(path: impl AsRef<Path>) -> io::Result<(Vec<Body>, RunSpec)> {
    let reader = BufReader::new(File::open(path)?);

    let mut bodies = Vec::new();
    let mut spec = RunSpec::default();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();

        if fields[0] == "SimulationTime" {
            if fields.len() < 4 {
                return Err(invalid(line_no, "expected SimulationTime,frames,_,G"));
            }
            spec.frames = parse_field(fields[1], line_no)? as usize;
            spec.g = Some(parse_field(fields[3], line_no)?);
            continue;
        }

        if fields.len() < 6 {
            return Err(invalid(line_no, "expected name,x,y,vx,vy,mass"));
        }
        let x = parse_field(fields[1], line_no)?;
        let y = parse_field(fields[2], line_no)?;
        let vx = parse_field(fields[3], line_no)?;
        let vy = parse_field(fields[4], line_no)?;
        let mass = parse_field(fields[5], line_no)?;
        bodies.push(Body::new(
            fields[0],
            Vector2::new(x, y),
            Vector2::new(vx, vy),
            mass,
        ));
    }

    Ok((bodies, spec))
}

fn parse_field(field: &str, line_no: usize) -> io::Result<f64> {
    field
        .parse()
        .map_err(|_| invalid(line_no, &format!("invalid number {field:?}")))
}

fn invalid(line_no: usize, message: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("line {}: {message}", line_no + 1),
    )
}

/// Buffered per-frame CSV writer for the simulation results.
pub struct FrameWriter {
    out: BufWriter<File>,
}

impl FrameWriter {
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "frame,name,pos_x,pos_y,vel_x,vel_y,force_x,force_y")?;
        Ok(Self { out })
    }

    /// Appends one row per body and flushes, so a partial run still leaves
    /// complete frames on disk.
    pub fn write_frame(&mut self, frame: usize, bodies: &[Body]) -> io::Result<()> {
        for body in bodies {
            writeln!(
                self.out,
                "{frame},{},{},{},{},{},{},{}",
                body.name,
                body.position.x,
                body.position.y,
                body.velocity.x,
                body.velocity.y,
                body.force.x,
                body.force.y,
            )?;
        }
        self.out.flush()
    }
}
