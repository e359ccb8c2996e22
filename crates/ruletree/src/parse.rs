//! Parser for dotted node paths
//!
//! Accepts the string form used at the serialization boundary:
//! `root`, `root.children.0`, `root.children.0.namedChildren.value`.

use winnow::ascii::digit1;
use winnow::combinator::{alt, preceded, repeat};
use winnow::prelude::*;
use winnow::token::take_while;

use crate::path::{NodePath, Segment};

type PResult<T> = winnow::ModalResult<T>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (offset {offset} in {input:?})")]
pub struct PathParseError {
    pub message: String,
    pub input: String,
    pub offset: usize,
}

/// Parse a dotted path string into a typed path
pub fn parse_path(input: &str) -> Result<NodePath, PathParseError> {
    let mut stream = input;
    match path.parse_next(&mut stream) {
        Ok(parsed) => {
            if stream.is_empty() {
                Ok(parsed)
            } else {
                let offset = input.len() - stream.len();
                Err(build_parse_error("unexpected trailing input", input, offset))
            }
        }
        Err(e) => {
            let offset = input.len().saturating_sub(stream.len());
            Err(build_parse_error(&format!("{e:?}"), input, offset))
        }
    }
}

fn build_parse_error(message: &str, input: &str, offset: usize) -> PathParseError {
    PathParseError {
        message: message.to_string(),
        input: input.to_string(),
        offset,
    }
}

fn path(input: &mut &str) -> PResult<NodePath> {
    "root".parse_next(input)?;
    let segments: Vec<Segment> = repeat(0.., preceded('.', segment)).parse_next(input)?;
    Ok(NodePath::from_segments(segments))
}

fn segment(input: &mut &str) -> PResult<Segment> {
    alt((
        preceded(("children", '.'), index).map(Segment::Child),
        preceded(("namedChildren", '.'), key).map(|k: &str| Segment::Named(k.to_string())),
    ))
    .parse_next(input)
}

fn index(input: &mut &str) -> PResult<usize> {
    digit1
        .try_map(|s: &str| s.parse::<usize>())
        .parse_next(input)
}

// Named-child keys are identifiers; a key containing '.' cannot be addressed
fn key<'i>(input: &mut &'i str) -> PResult<&'i str> {
    take_while(1.., |c: char| c != '.').parse_next(input)
}
