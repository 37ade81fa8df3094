use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use image::GrayImage;
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::config::{ChecksumPolicy, DecoderConfig, Strategy};
use crate::decoder::{
    AlgorithmicRowDecoder, ClassifierRowDecoder, DibitClassifier, FieldExtractor, RowDecoder,
    StripData,
};
use crate::detector::{
    AlgorithmicRowExtractor, ClassifierRowExtractor, HeaderExtractor, RowExtractor,
    SplitClassifier, SyncHeaderParser,
};
use crate::error::{Result, SoftstripError};
use crate::models::{BitMatrix, FileHeader};
use crate::utils::binarization::{otsu_binarize, threshold_binarize};
use crate::utils::deadline::Deadline;

/// Output name used when the first strip carries no filename.
pub const DEFAULT_OUTPUT_NAME: &str = "softstrip.bin";

/// A rectified strip: binary image (black = dark) and the grayscale image it
/// was derived from.
#[derive(Debug, Clone)]
pub struct StripImage {
    binary: GrayImage,
    gray: GrayImage,
}

impl StripImage {
    pub fn new(binary: GrayImage, gray: GrayImage) -> Result<Self> {
        if binary.dimensions() != gray.dimensions() {
            return Err(SoftstripError::MalformedImage(format!(
                "binary image is {:?} but grayscale image is {:?}",
                binary.dimensions(),
                gray.dimensions()
            )));
        }
        Ok(Self { binary, gray })
    }

    /// Binarize with a global threshold; pixels above it are white.
    pub fn from_gray(gray: GrayImage, threshold: u8) -> Result<Self> {
        Self::new(threshold_binarize(&gray, threshold), gray)
    }

    /// Binarize with Otsu's threshold.
    pub fn from_gray_otsu(gray: GrayImage) -> Result<Self> {
        Self::new(otsu_binarize(&gray), gray)
    }

    pub fn binary(&self) -> &GrayImage {
        &self.binary
    }

    pub fn gray(&self) -> &GrayImage {
        &self.gray
    }

    pub fn matrix(&self) -> Result<BitMatrix> {
        BitMatrix::from_images(&self.binary, &self.gray)
    }
}

/// External classifiers for the classifier-driven strategies.
#[derive(Clone, Default)]
pub struct Classifiers {
    pub split: Option<Arc<dyn SplitClassifier>>,
    pub dibit: Option<Arc<dyn DibitClassifier>>,
}

/// Per-strip outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripReport {
    pub header: FileHeader,
    pub checksum_valid: bool,
    pub payload_len: usize,
}

/// A file reassembled from its strips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFile {
    /// Header of the first strip.
    pub header: FileHeader,
    pub data: Vec<u8>,
    pub strips: Vec<StripReport>,
}

impl DecodedFile {
    pub fn filename(&self) -> Option<&str> {
        self.header.filename()
    }

    /// True when every strip passed its checksum.
    pub fn is_valid(&self) -> bool {
        self.strips.iter().all(|s| s.checksum_valid)
    }

    /// Write the data under its strip filename inside `dir`. Only the plain
    /// components of the filename are kept.
    pub fn write_to_dir<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let relative: PathBuf = self
            .filename()
            .map(|name| {
                Path::new(name)
                    .components()
                    .filter_map(|c| match c {
                        Component::Normal(part) => Some(part),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        let relative = if relative.as_os_str().is_empty() {
            PathBuf::from(DEFAULT_OUTPUT_NAME)
        } else {
            relative
        };

        let path = dir.as_ref().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &self.data)?;
        info!("wrote {} bytes to {}", self.data.len(), path.display());
        Ok(path)
    }
}

/// Strip decoding pipeline: header, rows, row decoding, fields.
pub struct Pipeline {
    config: DecoderConfig,
    extractor: Box<dyn RowExtractor>,
    decoder: Box<dyn RowDecoder>,
    fields: FieldExtractor,
}

impl Pipeline {
    /// Pipeline without external classifiers. Fails with `MissingClassifier`
    /// if the configuration asks for a classifier strategy.
    pub fn new(config: DecoderConfig) -> Result<Self> {
        Self::with_classifiers(config, Classifiers::default())
    }

    pub fn with_classifiers(config: DecoderConfig, classifiers: Classifiers) -> Result<Self> {
        let extractor: Box<dyn RowExtractor> = match config.row_extractor {
            Strategy::Algorithmic => Box::new(AlgorithmicRowExtractor),
            Strategy::Classifier => Box::new(ClassifierRowExtractor::new(
                classifiers
                    .split
                    .ok_or(SoftstripError::MissingClassifier("split"))?,
            )),
        };
        let decoder: Box<dyn RowDecoder> = match config.row_decoder {
            Strategy::Algorithmic => Box::new(AlgorithmicRowDecoder),
            Strategy::Classifier => Box::new(ClassifierRowDecoder::new(
                classifiers
                    .dibit
                    .ok_or(SoftstripError::MissingClassifier("dibit"))?,
            )),
        };
        Ok(Self {
            fields: FieldExtractor::new(config.wire_order),
            config,
            extractor,
            decoder,
        })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode a single strip.
    pub fn decode_strip(
        &self,
        image: &StripImage,
        first_strip: bool,
        deadline: &Deadline,
    ) -> Result<StripData> {
        let mut matrix = image.matrix()?;
        let mut header = SyncHeaderParser::new();
        header.remove_horizontal_header(&mut matrix)?;
        let bits_per_row = header.bits_per_row().ok_or_else(|| {
            SoftstripError::HeaderNotFound("bits per row unknown".to_string())
        })?;

        let rows = self.extractor.extract_rows(&matrix, bits_per_row)?;
        let decoded = self.decoder.decode_rows(&rows, bits_per_row, deadline)?;
        debug!(
            "{} bits per row, {} rows extracted, {} decoded",
            bits_per_row,
            rows.len(),
            decoded.len()
        );
        self.fields.extract(&decoded, first_strip, deadline)
    }

    /// Decode the strips of one file, in physical order, and concatenate
    /// their payloads.
    pub fn decode_file(&self, strips: &[StripImage]) -> Result<DecodedFile> {
        if strips.is_empty() {
            return Err(SoftstripError::MalformedImage("no strips given".to_string()));
        }
        let deadline = Deadline::start(self.config.timeout_duration());
        let decode = |(index, strip): (usize, &StripImage)| {
            self.decode_strip(strip, index == 0, &deadline)
        };

        let results: Box<dyn Iterator<Item = Result<StripData>> + '_> =
            if self.config.parallel_strips {
                let decoded: Vec<Result<StripData>> =
                    strips.par_iter().enumerate().map(decode).collect();
                Box::new(decoded.into_iter())
            } else {
                Box::new(strips.iter().enumerate().map(decode))
            };

        let mut header: Option<FileHeader> = None;
        let mut data = Vec::new();
        let mut reports = Vec::with_capacity(strips.len());
        for (index, result) in results.enumerate() {
            let strip = result?;
            info!(
                "strip {}: id {} seq {}, {} payload bytes",
                index,
                strip.header.strip_id,
                strip.header.seq_no,
                strip.payload.len()
            );
            if !strip.checksum_valid {
                match self.config.checksum_policy {
                    ChecksumPolicy::Strict => {
                        return Err(SoftstripError::ChecksumInvalid {
                            declared: strip.header.checksum,
                            computed: strip.computed_checksum,
                        });
                    }
                    ChecksumPolicy::Lenient => warn!(
                        "strip {index}: keeping payload despite checksum mismatch"
                    ),
                }
            }
            data.extend_from_slice(&strip.payload);
            reports.push(StripReport {
                header: strip.header.clone(),
                checksum_valid: strip.checksum_valid,
                payload_len: strip.payload.len(),
            });
            if header.is_none() {
                header = Some(strip.header);
            }
        }

        let header = header.ok_or(SoftstripError::NoRowsExtracted)?;
        if let Some(first) = &header.first_strip {
            let expected = first.file_length as usize;
            if data.len() > expected {
                data.truncate(expected);
            } else if data.len() < expected {
                warn!("file is {} bytes short", expected - data.len());
            }
        }
        Ok(DecodedFile {
            header,
            data,
            strips: reports,
        })
    }
}
