//! GFF3 annotation reading.
//!
//! Only the part types the diagram knows how to draw are kept:
//!
//! ```text
//! gene                -> Cds
//! promoter            -> Promoter
//! terminator          -> Terminator
//! ribosome_entry_site -> Rbs
//! ```
//!
//! Everything after a `##FASTA` directive is ignored.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{debug, info};
use rustc_hash::FxHashMap;
use thiserror::Error;

/// Errors that can occur while querying a GFF file.
#[derive(Error, Debug)]
pub enum GffError {
    #[error("Failed to read GFF file: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: invalid coordinate '{value}'")]
    InvalidCoordinate { line: usize, value: String },

    #[error("line {line}: attribute {key}={value} is not a number")]
    InvalidAttribute { line: usize, key: String, value: String },

    #[error("no drawable features on {contig} overlapping {start}-{end}")]
    EmptyRegion { contig: String, start: i64, end: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartType {
    Cds,
    Promoter,
    Terminator,
    Rbs,
}

impl PartType {
    pub fn from_gff_type(feature_type: &str) -> Option<PartType> {
        match feature_type {
            "gene" => Some(PartType::Cds),
            "promoter" => Some(PartType::Promoter),
            "terminator" => Some(PartType::Terminator),
            "ribosome_entry_site" => Some(PartType::Rbs),
            _ => None,
        }
    }
}

/// Display sub-record of a feature. Numeric and color fields come from the
/// GFF attributes of the same name; all other attributes are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayOptions {
    pub label: Option<String>,
    pub color: Option<String>,
    pub label_color: Option<String>,
    pub edge_color: Option<String>,
    pub label_size: Option<f64>,
    pub label_x_offset: Option<f64>,
    pub label_y_offset: Option<f64>,
    pub y_extent: Option<f64>,
    pub arrowhead_length: Option<f64>,
    pub linewidth: Option<f64>,
    pub extra: FxHashMap<String, String>,
}

impl DisplayOptions {
    pub fn locus_tag(&self) -> Option<&str> {
        self.extra.get("locus_tag").map(String::as_str)
    }

    fn set(&mut self, line: usize, key: &str, value: String) -> Result<(), GffError> {
        let numeric = |value: &str| {
            value.trim().parse::<f64>().map_err(|_| GffError::InvalidAttribute {
                line,
                key: key.to_string(),
                value: value.to_string(),
            })
        };
        match key {
            "label" => self.label = Some(value),
            "color" => self.color = Some(value),
            "label_color" => self.label_color = Some(value),
            "edge_color" => self.edge_color = Some(value),
            "label_size" => self.label_size = Some(numeric(&value)?),
            "label_x_offset" => self.label_x_offset = Some(numeric(&value)?),
            "label_y_offset" => self.label_y_offset = Some(numeric(&value)?),
            "y_extent" => self.y_extent = Some(numeric(&value)?),
            "arrowhead_length" => self.arrowhead_length = Some(numeric(&value)?),
            "linewidth" => self.linewidth = Some(numeric(&value)?),
            _ => {
                self.extra.insert(key.to_string(), value);
            }
        }
        Ok(())
    }
}

/// A drawable annotation feature. `start`/`end` are 1-based inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub name: String,
    pub part_type: PartType,
    pub forward: bool,
    pub start: i64,
    pub end: i64,
    pub opts: DisplayOptions,
}

/// Undo GFF3 percent-encoding: every `%XX` hex escape becomes its byte,
/// malformed escapes are kept as written.
fn decode_value(value: &str) -> String {
    if !value.contains('%') {
        return value.to_string();
    }
    let hex = |b: u8| (b as char).to_digit(16).map(|d| d as u8);
    let bytes = value.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                decoded.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

/// Parse one data row; `Ok(None)` for rows that are not drawable parts.
fn parse_row(line_no: usize, line: &str) -> Result<Option<(String, Feature)>, GffError> {
    let parts: Vec<&str> = line.split('\t').collect();
    if parts.len() != 9 {
        return Ok(None);
    }
    let Some(part_type) = PartType::from_gff_type(parts[2]) else {
        return Ok(None);
    };

    let coordinate = |value: &str| {
        value.trim().parse::<i64>().map_err(|_| GffError::InvalidCoordinate {
            line: line_no,
            value: value.to_string(),
        })
    };
    let start = coordinate(parts[3])?;
    let end = coordinate(parts[4])?;

    let mut opts = DisplayOptions::default();
    let mut name = None;
    let mut id = None;
    for attrib in parts[8].split(';') {
        let Some((key, value)) = attrib.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = decode_value(value);
        match key {
            "Name" => name = Some(value),
            "ID" => id = Some(value),
            _ => opts.set(line_no, key, value)?,
        }
    }

    let name = name.or(id).or_else(|| opts.locus_tag().map(str::to_string));
    let Some(name) = name else {
        debug!("line {}: skipping unnamed {} feature", line_no, parts[2]);
        return Ok(None);
    };

    let feature = Feature {
        name,
        part_type,
        forward: parts[6] == "+",
        start,
        end,
        opts,
    };
    Ok(Some((parts[0].to_string(), feature)))
}

/// Returns the design for `contig` (any contig when `None`): all drawable
/// features overlapping the 0-based half-open `window`, sorted by start.
pub fn load_design<P: AsRef<Path>>(
    path: P,
    contig: Option<&str>,
    window: (i64, i64),
) -> Result<Vec<Feature>, GffError> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);

    info!("Loading GFF file...");

    let mut design = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.starts_with("##FASTA") {
            break;
        }
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }

        let Some((seqid, feature)) = parse_row(idx + 1, &line)? else {
            continue;
        };
        if contig.is_some_and(|c| c != seqid) {
            continue;
        }
        if feature.end > window.0 && feature.start < window.1 {
            design.push(feature);
        }
    }

    if design.is_empty() {
        return Err(GffError::EmptyRegion {
            contig: contig.unwrap_or("*").to_string(),
            start: window.0 + 1,
            end: window.1,
        });
    }

    design.sort_by_key(|f| f.start);
    info!("Found {} features in region", design.len());

    Ok(design)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const GFF: &str = "##gff-version 3\n\
        ctg1\tprokka\tgene\t300\t900\t.\t-\t.\tID=g2;Name=lacY;locus_tag=ABC_00002\n\
        ctg1\tprokka\tCDS\t300\t900\t.\t-\t0\tID=c2;locus_tag=ABC_00002\n\
        ctg1\tprokka\tgene\t10\t250\t.\t+\t.\tID=g1;locus_tag=ABC_00001;color=%23ff0000\n\
        ctg1\tmanual\tpromoter\t1\t9\t.\t+\t.\tName=pLac;y_extent=4\n\
        ctg2\tprokka\tgene\t10\t250\t.\t+\t.\tID=g3;Name=other;locus_tag=ABC_00003\n\
        ctg1\tprokka\tgene\t5000\t6000\t.\t+\t.\tName=far\n\
        ##FASTA\n\
        >ctg1\n\
        ACGT\n";

    fn gff_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_design_is_filtered_and_sorted() {
        let file = gff_file(GFF);
        let design = load_design(file.path(), Some("ctg1"), (0, 1000)).unwrap();
        let names: Vec<&str> = design.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["pLac", "g1", "lacY"]);
        assert_eq!(design[0].part_type, PartType::Promoter);
        assert_eq!(design[0].opts.y_extent, Some(4.0));
        assert!(design[1].forward);
        assert!(!design[2].forward);
        assert_eq!(design[2].opts.locus_tag(), Some("ABC_00002"));
    }

    #[test]
    fn test_attributes_are_decoded() {
        let file = gff_file(GFF);
        let design = load_design(file.path(), Some("ctg1"), (0, 1000)).unwrap();
        assert_eq!(design[1].opts.color.as_deref(), Some("#ff0000"));
    }

    #[test]
    fn test_decode_value_handles_any_escape() {
        assert_eq!(decode_value("%23ff0000"), "#ff0000");
        assert_eq!(decode_value("a%3Bb%3Dc%2C%25"), "a;b=c,%");
        assert_eq!(decode_value("%C3%A9t%C3%A9"), "été");
        assert_eq!(decode_value("100%"), "100%");
        assert_eq!(decode_value("%zz%4"), "%zz%4");
        assert_eq!(decode_value("plain"), "plain");
    }

    #[test]
    fn test_window_overlap() {
        let file = gff_file(GFF);
        // Only lacY (300-900) overlaps [899, 950)
        let design = load_design(file.path(), Some("ctg1"), (899, 950)).unwrap();
        assert_eq!(design.len(), 1);
        assert_eq!(design[0].name, "lacY");
        // A window ending at the feature start excludes it
        let design = load_design(file.path(), Some("ctg1"), (249, 300)).unwrap();
        assert_eq!(design[0].name, "g1");
        assert_eq!(design.len(), 1);
    }

    #[test]
    fn test_no_contig_matches_all() {
        let file = gff_file(GFF);
        let design = load_design(file.path(), None, (0, 1000)).unwrap();
        assert_eq!(design.len(), 4);
    }

    #[test]
    fn test_empty_region_and_missing_contig() {
        let file = gff_file(GFF);
        let err = load_design(file.path(), Some("ctg1"), (2000, 3000)).unwrap_err();
        assert!(matches!(err, GffError::EmptyRegion { start: 2001, end: 3000, .. }));
        assert!(load_design(file.path(), Some("chrX"), (0, 1000)).is_err());
    }

    #[test]
    fn test_bad_rows() {
        let file = gff_file("ctg\tsrc\tgene\tten\t20\t.\t+\t.\tName=x\n");
        assert!(matches!(
            load_design(file.path(), None, (0, 100)),
            Err(GffError::InvalidCoordinate { line: 1, .. })
        ));

        let file = gff_file("ctg\tsrc\tgene\t1\t20\t.\t+\t.\tName=x;label_size=big\n");
        assert!(matches!(
            load_design(file.path(), None, (0, 100)),
            Err(GffError::InvalidAttribute { .. })
        ));

        let file = gff_file("ctg\tsrc\tgene\t1\t20\n");
        assert!(matches!(
            load_design(file.path(), None, (0, 100)),
            Err(GffError::EmptyRegion { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_design("/nonexistent/genes.gff", None, (0, 1)),
            Err(GffError::Io(_))
        ));
    }
}
