//! # Annotation tables
//!
//! Two line-oriented text tables feed the section builder:
//!
//! - the maxspeed annotations, one `wayId, units, forward[, backward]` line per way;
//! - the feature mapping, one `featureId, wayId` line per road feature.
//!
//! Fields are separated by any run of `,`, spaces, tabs and line breaks.
//! Both parsers are all-or-nothing: a single malformed line fails the whole table.

use crate::speed::{INVALID_SPEED, Maxspeed, MaxspeedType, Units};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Maxspeed annotations keyed by way ID.
pub type WayIdToMaxspeed = HashMap<u64, Maxspeed>;

/// Way IDs keyed by road feature ID.
pub type FeatureIdToWayId = HashMap<u32, u64>;

const DELIMITERS: &[char] = &[',', ' ', '\t', '\r', '\n'];

/// What exactly is wrong with a line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedLine {
    #[error("invalid way ID `{0}`")]
    InvalidWayId(String),
    #[error("invalid feature ID `{0}`")]
    InvalidFeatureId(String),
    #[error("missing way ID")]
    MissingWayId,
    #[error("missing units")]
    MissingUnits,
    #[error("unrecognized units `{0}`")]
    UnknownUnits(String),
    #[error("missing forward speed")]
    MissingForwardSpeed,
    #[error("invalid forward speed `{0}`")]
    InvalidForwardSpeed(String),
    #[error("invalid backward speed `{0}`")]
    InvalidBackwardSpeed(String),
    #[error("unexpected trailing field `{0}`")]
    TrailingField(String),
    #[error("duplicate way ID {0}")]
    DuplicateWayId(u64),
    #[error("duplicate feature ID {0}")]
    DuplicateFeatureId(u32),
}

#[derive(Debug, Error)]
pub enum AnnotationParseError {
    #[error("Malformed maxspeed annotation on line {line}: {kind}")]
    MalformedLine { line: usize, kind: MalformedLine },
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum FeatureMappingParseError {
    #[error("Malformed feature mapping on line {line}: {kind}")]
    MalformedLine { line: usize, kind: MalformedLine },
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),
}

fn tokenize(line: &str) -> impl Iterator<Item = &str> {
    line.split(DELIMITERS).filter(|token| !token.is_empty())
}

/// Parses a plain unsigned decimal integer (no sign, no whitespace).
fn parse_unsigned<T: FromStr>(token: &str) -> Option<T> {
    if token.bytes().all(|byte| byte.is_ascii_digit()) {
        token.parse().ok()
    } else {
        None
    }
}

fn parse_maxspeed_line<'a>(
    mut tokens: impl Iterator<Item = &'a str>,
    first: &'a str,
) -> Result<(u64, Maxspeed), MalformedLine> {
    let way_id =
        parse_unsigned(first).ok_or_else(|| MalformedLine::InvalidWayId(first.to_string()))?;

    let units_token = tokens.next().ok_or(MalformedLine::MissingUnits)?;
    let units = Units::from_token(units_token)
        .ok_or_else(|| MalformedLine::UnknownUnits(units_token.to_string()))?;

    let forward_token = tokens.next().ok_or(MalformedLine::MissingForwardSpeed)?;
    let forward = parse_unsigned::<MaxspeedType>(forward_token)
        .filter(|speed| *speed != INVALID_SPEED)
        .ok_or_else(|| MalformedLine::InvalidForwardSpeed(forward_token.to_string()))?;

    let backward = tokens
        .next()
        .map(|token| {
            parse_unsigned::<MaxspeedType>(token)
                .ok_or_else(|| MalformedLine::InvalidBackwardSpeed(token.to_string()))
        })
        .transpose()?;

    if let Some(extra) = tokens.next() {
        return Err(MalformedLine::TrailingField(extra.to_string()));
    }

    Ok((way_id, Maxspeed::new(units, forward, backward)))
}

/// Parses a maxspeed annotation table.
///
/// Empty lines (and lines containing only delimiters) are skipped.
/// The country default marker ([`crate::COMMON_MAXSPEED_VALUE`]) is kept as-is;
/// it is up to the resolver to replace it.
///
/// # Errors
///
/// Fails on the first malformed line, reporting its 1-based line number.
/// Duplicate way IDs are considered malformed.
pub fn parse_maxspeeds(contents: &str) -> Result<WayIdToMaxspeed, AnnotationParseError> {
    let mut result = WayIdToMaxspeed::new();

    for (index, line) in contents.lines().enumerate() {
        let mut tokens = tokenize(line);
        let Some(first) = tokens.next() else {
            continue;
        };

        let malformed = |kind| AnnotationParseError::MalformedLine {
            line: index + 1,
            kind,
        };

        let (way_id, maxspeed) = parse_maxspeed_line(tokens, first).map_err(malformed)?;
        match result.entry(way_id) {
            Entry::Occupied(_) => return Err(malformed(MalformedLine::DuplicateWayId(way_id))),
            Entry::Vacant(entry) => {
                entry.insert(maxspeed);
            }
        }
    }

    Ok(result)
}

/// Reads and parses a maxspeed annotation table from disk.
///
/// # Errors
///
/// See [`parse_maxspeeds`]. I/O errors are also propagated.
pub fn parse_maxspeeds_from_path<P: AsRef<Path>>(
    path: P,
) -> Result<WayIdToMaxspeed, AnnotationParseError> {
    let contents = std::fs::read_to_string(path)?;
    parse_maxspeeds(&contents)
}

/// Parses a `featureId, wayId` mapping table.
///
/// # Errors
///
/// Fails on the first malformed line, reporting its 1-based line number.
/// Each feature ID may only appear once.
pub fn parse_feature_mapping(contents: &str) -> Result<FeatureIdToWayId, FeatureMappingParseError> {
    let mut result = FeatureIdToWayId::new();

    for (index, line) in contents.lines().enumerate() {
        let mut tokens = tokenize(line);
        let Some(first) = tokens.next() else {
            continue;
        };

        let malformed = |kind| FeatureMappingParseError::MalformedLine {
            line: index + 1,
            kind,
        };

        let feature_id: u32 = parse_unsigned(first)
            .ok_or_else(|| malformed(MalformedLine::InvalidFeatureId(first.to_string())))?;
        let way_token = tokens
            .next()
            .ok_or_else(|| malformed(MalformedLine::MissingWayId))?;
        let way_id: u64 = parse_unsigned(way_token)
            .ok_or_else(|| malformed(MalformedLine::InvalidWayId(way_token.to_string())))?;
        if let Some(extra) = tokens.next() {
            return Err(malformed(MalformedLine::TrailingField(extra.to_string())));
        }

        if result.insert(feature_id, way_id).is_some() {
            return Err(malformed(MalformedLine::DuplicateFeatureId(feature_id)));
        }
    }

    Ok(result)
}

/// Reads and parses a feature mapping table from disk.
///
/// # Errors
///
/// See [`parse_feature_mapping`]. I/O errors are also propagated.
pub fn parse_feature_mapping_from_path<P: AsRef<Path>>(
    path: P,
) -> Result<FeatureIdToWayId, FeatureMappingParseError> {
    let contents = std::fs::read_to_string(path)?;
    parse_feature_mapping(&contents)
}
