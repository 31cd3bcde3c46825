//! Dialect detection over a sample of lines.

use proxytrail_core::record::Dialect;

/// Lines sampled from the head of the file when none is configured.
pub const DEFAULT_SAMPLE_LINES: usize = 10;

/// A line votes for [`Dialect::Pipe`] above this many `|` characters.
const PIPE_VOTE_THRESHOLD: usize = 5;
/// A line votes for [`Dialect::Space`] above this many whitespace-separated
/// fields. Runs of blanks count as one separator here, unlike in parsing.
const SPACE_VOTE_THRESHOLD: usize = 10;

/// Pick the dialect most lines of `sample` look like. Ties, including an
/// empty sample, go to [`Dialect::Space`].
pub fn detect_dialect<I, S>(sample: I) -> Dialect
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  let mut pipe_votes = 0usize;
  let mut space_votes = 0usize;

  for line in sample {
    let line = line.as_ref();
    if line.matches('|').count() > PIPE_VOTE_THRESHOLD {
      pipe_votes += 1;
    } else if line.split_whitespace().count() > SPACE_VOTE_THRESHOLD {
      space_votes += 1;
    }
  }

  if pipe_votes > space_votes { Dialect::Pipe } else { Dialect::Space }
}

#[cfg(test)]
mod tests {
  use super::*;

  const PIPE: &str =
    "2026-01-01T10:00:00|10.0.0.5|-|bob|-|GET|http://example.com/a|-|200|1024|-|-|-|TCP_MISS";
  const SPACE: &str =
    "1767261600.000 10.0.0.9 - alice - GET TCP_MISS/200 http://example.com/b - 200 512";

  #[test]
  fn mostly_pipe_sample_is_pipe() {
    let mut sample = vec![PIPE; 8];
    sample.extend([SPACE; 2]);
    assert_eq!(detect_dialect(sample), Dialect::Pipe);
  }

  #[test]
  fn mostly_space_sample_is_space() {
    let mut sample = vec![SPACE; 8];
    sample.extend([PIPE; 2]);
    assert_eq!(detect_dialect(sample), Dialect::Space);
  }

  #[test]
  fn tie_favors_space() {
    assert_eq!(detect_dialect([PIPE, SPACE]), Dialect::Space);
    assert_eq!(detect_dialect(Vec::<String>::new()), Dialect::Space);
  }

  #[test]
  fn short_lines_do_not_vote() {
    assert_eq!(detect_dialect(["a|b|c", "x y z", PIPE]), Dialect::Pipe);
  }

  #[test]
  fn padded_columns_do_not_inflate_space_votes() {
    let padded = "1767261600.000     180 10.0.0.9  TCP_MISS/200  411  GET";
    assert_eq!(detect_dialect([PIPE, padded]), Dialect::Pipe);
  }
}
