//! Renders walked entries as aligned `ls -l` style rows.
//!
//! Rows are buffered and flushed once per root path so column widths are
//! computed over that root's listing, mirroring the tab-writer behavior of
//! the stock tooling. Emission order is preserved.

use chrono::Datelike;

use crate::remote::{FileKind, FileStatus};

const COLUMNS: usize = 8;

pub struct Lister<W: std::io::Write> {
    out: W,
    human_readable: bool,
    rows: Vec<[String; COLUMNS]>,
}

impl<W: std::io::Write> Lister<W> {
    pub fn new(out: W, human_readable: bool) -> Self {
        Self {
            out,
            human_readable,
            rows: Vec::new(),
        }
    }

    /// Buffer one row for `status`. Call [`Lister::flush`] after the root
    /// path it belongs to has been fully walked.
    pub fn push(&mut self, status: &FileStatus) {
        let modified = chrono::DateTime::<chrono::Local>::from(status.modified);
        let time_or_year = if modified.year() == chrono::Local::now().year() {
            modified.format("%H:%M").to_string()
        } else {
            modified.format("%Y").to_string()
        };
        let size = if self.human_readable {
            bytesize::ByteSize(status.size).to_string()
        } else {
            status.size.to_string()
        };
        self.rows.push([
            mode_string(status),
            status.replication.to_string(),
            status.owner.clone(),
            status.group.clone(),
            size,
            modified.format("%Y-%m-%d").to_string(),
            time_or_year,
            status.path.clone(),
        ]);
    }

    /// Write all buffered rows with aligned columns.
    pub fn flush(&mut self) -> std::io::Result<()> {
        let mut widths = [0usize; COLUMNS - 1];
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row.iter()) {
                *width = (*width).max(cell.len());
            }
        }
        for row in self.rows.drain(..) {
            for (width, cell) in widths.iter().copied().zip(row.iter()) {
                write!(self.out, "{cell:>width$} ")?;
            }
            // the path column is left-aligned and unpadded
            writeln!(self.out, "{}", row[COLUMNS - 1])?;
        }
        self.out.flush()
    }
}

fn mode_string(status: &FileStatus) -> String {
    let kind = match status.kind {
        FileKind::Directory => 'd',
        FileKind::Symlink => 'l',
        FileKind::File => '-',
    };
    let mut out = String::with_capacity(10);
    out.push(kind);
    for shift in [6u32, 3, 0] {
        let bits = (status.mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}
