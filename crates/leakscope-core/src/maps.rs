//! `/proc/<pid>/maps` text parser.
//!
//! The probe writes the maps section verbatim; only the offline reader
//! parses it, to attribute raw frame addresses to the mapping that contains
//! them. Malformed lines are skipped rather than failing the whole report —
//! the maps text is an opportunistic capture, not a trusted input.

/// One parsed mapping line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntry {
    /// Inclusive start of the mapped range.
    pub start: usize,
    /// Exclusive end of the mapped range.
    pub end: usize,
    /// Permission string as printed by the kernel, e.g. `r-xp`.
    pub perms: String,
    /// File offset of the mapping.
    pub offset: usize,
    /// Backing path, or pseudo-path like `[heap]`. `None` for anonymous
    /// mappings.
    pub path: Option<String>,
}

impl MapEntry {
    /// True when `addr` falls inside this mapping.
    #[must_use]
    pub fn contains(&self, addr: usize) -> bool {
        self.start <= addr && addr < self.end
    }

    /// True for mappings backed by a real file (absolute path), where
    /// `addr - start + offset` is meaningful to a symbolizer.
    #[must_use]
    pub fn is_file_backed(&self) -> bool {
        self.path.as_ref().is_some_and(|p| p.starts_with('/'))
    }
}

/// Parses maps text into entries, skipping lines that do not match the
/// kernel's format.
#[must_use]
pub fn parse_maps(text: &str) -> Vec<MapEntry> {
    text.lines().filter_map(parse_line).collect()
}

/// Entry containing `addr`, if any. Later duplicate ranges never shadow
/// earlier ones, matching the kernel's sorted, non-overlapping output.
#[must_use]
pub fn find_containing<'a>(entries: &'a [MapEntry], addr: usize) -> Option<&'a MapEntry> {
    entries.iter().find(|e| e.contains(addr))
}

fn parse_line(line: &str) -> Option<MapEntry> {
    // start-end perms offset dev inode [path]
    let mut fields = line.split_whitespace();
    let range = fields.next()?;
    let perms = fields.next()?;
    let offset = fields.next()?;
    let _dev = fields.next()?;
    let _inode = fields.next()?;
    let path = fields.next().map(str::to_owned);

    let (start, end) = range.split_once('-')?;
    Some(MapEntry {
        start: usize::from_str_radix(start, 16).ok()?,
        end: usize::from_str_radix(end, 16).ok()?,
        perms: perms.to_owned(),
        offset: usize::from_str_radix(offset, 16).ok()?,
        path,
    })
}
