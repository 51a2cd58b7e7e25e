/// Step counter for one episode.
///
/// `tick` hands out step indices `0..total` once each; after the last one
/// the clock reports [`EpisodeClock::is_finished`] until it is rewound.
///
/// # Examples
///
/// ```
/// use evhub_sim::env::clock::EpisodeClock;
///
/// let mut clock = EpisodeClock::new(2);
/// assert_eq!(clock.tick(), Some(0));
/// assert_eq!(clock.tick(), Some(1));
/// assert_eq!(clock.tick(), None);
/// assert!(clock.is_finished());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpisodeClock {
    /// Next step to hand out
    current: usize,
    /// Steps in the episode
    total: usize,
}

impl EpisodeClock {
    /// Creates a clock for an episode of `total` steps.
    pub fn new(total: usize) -> Self {
        Self { current: 0, total }
    }

    /// Returns the next step index and advances, or `None` once the episode is over.
    pub fn tick(&mut self) -> Option<usize> {
        if self.current < self.total {
            let step = self.current;
            self.current += 1;
            Some(step)
        } else {
            None
        }
    }

    /// Index of the step that the next `tick` will return.
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// True once every step has been handed out.
    pub fn is_finished(&self) -> bool {
        self.current >= self.total
    }

    /// Rewinds to step 0.
    pub fn rewind(&mut self) {
        self.current = 0;
    }
}
