//! Matchers pair unmatched input labels with unmatched destination labels.

use std::collections::HashMap;
use std::io::{BufRead, Write};

use crate::error::MatcherError;

/// Proposes pairs between two label lists.
///
/// The returned map goes from input label to destination label. It may be
/// partial; labels left out stay unmatched. Keys must come from `inputs`,
/// values from `destinations`, and no destination may be used twice.
pub trait Matcher {
    /// Proposes pairs.
    ///
    /// # Errors
    /// Any failure of the underlying source of decisions.
    fn match_labels(
        &mut self,
        inputs: &[String],
        destinations: &[String],
    ) -> Result<HashMap<String, String>, MatcherError>;
}

impl<F> Matcher for F
where
    F: FnMut(&[String], &[String]) -> Result<HashMap<String, String>, MatcherError>,
{
    fn match_labels(
        &mut self,
        inputs: &[String],
        destinations: &[String],
    ) -> Result<HashMap<String, String>, MatcherError> {
        self(inputs, destinations)
    }
}

/// Pins a closure to the [`Matcher`] signature so its argument lifetimes
/// are inferred correctly.
pub fn matcher_fn<F>(f: F) -> F
where
    F: FnMut(&[String], &[String]) -> Result<HashMap<String, String>, MatcherError>,
{
    f
}

/// Matcher that never pairs anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMatcher;

impl Matcher for NoopMatcher {
    fn match_labels(
        &mut self,
        _inputs: &[String],
        _destinations: &[String],
    ) -> Result<HashMap<String, String>, MatcherError> {
        Ok(HashMap::new())
    }
}

/// Pairs labels that are equal after trimming and lowercasing.
///
/// A normalized label that occurs more than once on either side is left
/// alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactLabelMatcher;

fn normalize(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Normalized label to the original, dropping normalized collisions.
fn unique_by_normalized(labels: &[String]) -> HashMap<String, &String> {
    let mut counts: HashMap<String, (usize, &String)> = HashMap::new();
    for label in labels {
        counts.entry(normalize(label)).or_insert((0, label)).0 += 1;
    }
    counts
        .into_iter()
        .filter(|(_, (count, _))| *count == 1)
        .map(|(key, (_, label))| (key, label))
        .collect()
}

impl Matcher for ExactLabelMatcher {
    fn match_labels(
        &mut self,
        inputs: &[String],
        destinations: &[String],
    ) -> Result<HashMap<String, String>, MatcherError> {
        let destinations = unique_by_normalized(destinations);
        Ok(unique_by_normalized(inputs)
            .into_iter()
            .filter_map(|(key, input)| {
                destinations
                    .get(&key)
                    .map(|destination| (input.clone(), (*destination).clone()))
            })
            .collect())
    }
}

/// Asks an operator, one destination at a time, which input it matches.
///
/// For each destination the remaining inputs are listed, numbered from 1.
/// A blank answer skips the destination and a chosen input is not offered
/// again. End of input stops prompting and keeps the pairs made so far.
#[derive(Debug)]
pub struct PromptMatcher<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> PromptMatcher<R, W> {
    /// Creates a matcher reading answers from `reader` and writing prompts
    /// to `writer`.
    pub const fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Returns the reader and writer.
    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }

    /// Reads one answer: `Some(None)` for blank, `None` at end of input.
    fn ask(
        &mut self,
        destination: &str,
        choices: &[&String],
    ) -> Result<Option<Option<usize>>, MatcherError> {
        for (number, choice) in choices.iter().enumerate() {
            writeln!(self.writer, "  {}. {choice}", number + 1)?;
        }
        loop {
            write!(self.writer, "Which matches {destination}? (number, or blank to skip): ")?;
            self.writer.flush()?;

            let mut line = String::new();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            let answer = line.trim();
            if answer.is_empty() {
                return Ok(Some(None));
            }
            match answer.parse::<usize>() {
                Ok(number) if (1..=choices.len()).contains(&number) => {
                    return Ok(Some(Some(number - 1)));
                }
                _ => writeln!(self.writer, "Enter a number between 1 and {}", choices.len())?,
            }
        }
    }
}

impl<R: BufRead, W: Write> Matcher for PromptMatcher<R, W> {
    fn match_labels(
        &mut self,
        inputs: &[String],
        destinations: &[String],
    ) -> Result<HashMap<String, String>, MatcherError> {
        let mut remaining: Vec<&String> = inputs.iter().collect();
        let mut matches = HashMap::new();

        for destination in destinations {
            if remaining.is_empty() {
                break;
            }
            match self.ask(destination, &remaining)? {
                None => break,
                Some(None) => {}
                Some(Some(index)) => {
                    let input = remaining.remove(index);
                    matches.insert(input.clone(), destination.clone());
                }
            }
        }
        Ok(matches)
    }
}
