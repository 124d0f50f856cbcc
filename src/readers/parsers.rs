//! Parsers for the small text inputs of the command line tools

// external crates
use anyhow::{bail, Result};
use nom::branch::alt;
use nom::character::complete::{char, space0, space1};
use nom::combinator::{all_consuming, map, value, verify};
use nom::multi::separated_list1;
use nom::sequence::{delimited, separated_pair};
use nom::IResult;

/// Parse a selection of material indices such as `1-4 7,9`
///
/// Ranges are inclusive, items are separated by whitespace or commas. The
/// result is sorted with duplicates removed.
///
/// ```rust
/// # use d3parts::readers::parsers::parse_part_selection;
/// let parts = parse_part_selection("7, 1-3 2").unwrap();
/// assert_eq!(parts, vec![1, 2, 3, 7]);
/// ```
pub fn parse_part_selection(text: &str) -> Result<Vec<usize>> {
    match all_consuming(part_selection)(text.trim()) {
        Ok((_, mut parts)) => {
            parts.sort_unstable();
            parts.dedup();
            Ok(parts)
        }
        Err(e) => bail!("Invalid part selection \"{text}\": {e}"),
    }
}

/// Every index named by a selection, in the order given
pub fn part_selection(i: &str) -> IResult<&str, Vec<usize>> {
    map(separated_list1(separator, selection_item), |groups| {
        groups.into_iter().flatten().collect()
    })(i)
}

/// A single index or an inclusive range
fn selection_item(i: &str) -> IResult<&str, Vec<usize>> {
    alt((
        map(
            verify(separated_pair(index, char('-'), index), |(a, b)| a <= b),
            |(a, b)| (a..=b).collect(),
        ),
        map(index, |n| vec![n]),
    ))(i)
}

fn index(i: &str) -> IResult<&str, usize> {
    map(nom::character::complete::u64, |n| n as usize)(i)
}

fn separator(i: &str) -> IResult<&str, ()> {
    alt((value((), delimited(space0, char(','), space0)), value((), space1)))(i)
}
