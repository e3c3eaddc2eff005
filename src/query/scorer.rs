//! Scorers: matchers that can also produce a relevance score.

use std::fmt::Debug;

use crate::error::Result;
use crate::index::DocId;
use crate::query::matcher::Matcher;

/// Produces the score of the document a collector is currently looking at.
///
/// Collectors pull the score only when they need it, so sources must not do
/// any work until [`score`](ScoreSource::score) is called.
pub trait ScoreSource {
    /// Score of the current document.
    fn score(&mut self) -> Result<f32>;
}

/// Trait for document scorers: a matcher positioned on a document plus the
/// relevance function for that document.
pub trait Scorer: Matcher {
    /// Calculate the score of the current document.
    fn score(&mut self) -> Result<f32>;

    /// Get the maximum possible score.
    fn max_score(&self) -> f32;

    /// Get the name of this scorer.
    fn name(&self) -> &'static str;
}

/// Exposes a [`Scorer`] as a [`ScoreSource`].
pub struct ScorerScoreSource<'a> {
    scorer: &'a mut dyn Scorer,
}

impl<'a> ScorerScoreSource<'a> {
    /// Wrap a scorer positioned on the current document.
    pub fn new(scorer: &'a mut dyn Scorer) -> Self {
        ScorerScoreSource { scorer }
    }
}

impl ScoreSource for ScorerScoreSource<'_> {
    fn score(&mut self) -> Result<f32> {
        self.scorer.score()
    }
}

/// A score source returning a fixed value, used when replaying cached hits.
#[derive(Debug, Clone, Copy)]
pub struct FixedScore(pub f32);

impl ScoreSource for FixedScore {
    fn score(&mut self) -> Result<f32> {
        Ok(self.0)
    }
}

/// Memoizes the score of the current document so that several consumers
/// trigger a single call on the wrapped source.
pub struct CachedScore<'a> {
    inner: &'a mut dyn ScoreSource,
    score: Option<f32>,
}

impl<'a> CachedScore<'a> {
    /// Wrap the source of the current document.
    pub fn new(inner: &'a mut dyn ScoreSource) -> Self {
        CachedScore { inner, score: None }
    }
}

impl ScoreSource for CachedScore<'_> {
    fn score(&mut self) -> Result<f32> {
        match self.score {
            Some(score) => Ok(score),
            None => {
                let score = self.inner.score()?;
                self.score = Some(score);
                Ok(score)
            }
        }
    }
}

/// Scorer giving every matching document the same score.
#[derive(Debug)]
pub struct ConstantScorer {
    matcher: Box<dyn Matcher>,
    score: f32,
}

impl ConstantScorer {
    /// Create a constant scorer over a matcher.
    pub fn new(matcher: Box<dyn Matcher>, score: f32) -> Self {
        ConstantScorer { matcher, score }
    }
}

impl Matcher for ConstantScorer {
    fn doc_id(&self) -> DocId {
        self.matcher.doc_id()
    }

    fn next(&mut self) -> Result<bool> {
        self.matcher.next()
    }

    fn skip_to(&mut self, target: DocId) -> Result<bool> {
        self.matcher.skip_to(target)
    }

    fn cost(&self) -> u64 {
        self.matcher.cost()
    }

    fn is_exhausted(&self) -> bool {
        self.matcher.is_exhausted()
    }
}

impl Scorer for ConstantScorer {
    fn score(&mut self) -> Result<f32> {
        Ok(self.score)
    }

    fn max_score(&self) -> f32 {
        self.score
    }

    fn name(&self) -> &'static str {
        "Constant"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::matcher::AllMatcher;

    struct CountingSource {
        calls: usize,
    }

    impl ScoreSource for CountingSource {
        fn score(&mut self) -> Result<f32> {
            self.calls += 1;
            Ok(2.5)
        }
    }

    #[test]
    fn test_cached_score_calls_once() {
        let mut source = CountingSource { calls: 0 };
        {
            let mut cached = CachedScore::new(&mut source);
            assert_eq!(cached.score().unwrap(), 2.5);
            assert_eq!(cached.score().unwrap(), 2.5);
        }
        assert_eq!(source.calls, 1);
    }

    #[test]
    fn test_constant_scorer() {
        let mut scorer = ConstantScorer::new(Box::new(AllMatcher::new(2)), 1.5);
        assert!(scorer.next().unwrap());
        assert_eq!(scorer.doc_id(), 0);
        assert_eq!(Scorer::score(&mut scorer).unwrap(), 1.5);

        let mut source = ScorerScoreSource::new(&mut scorer);
        assert_eq!(source.score().unwrap(), 1.5);
        assert_eq!(scorer.max_score(), 1.5);
        assert_eq!(scorer.name(), "Constant");
    }
}
