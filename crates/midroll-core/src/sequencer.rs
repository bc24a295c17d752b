//! Ad break scheduling
//!
//! Decides when breaks play and which ad within a break is next. Pure state
//! machine: no surfaces, no timers. The session asks it questions on content
//! ticks and drives it through its transitions.
//!
//! Bookkeeping is per content item: pre-roll and post-roll play at most once
//! each, every mid-roll break at most once by id. A break is marked played
//! the moment it starts, which is what keeps a trigger time that gets
//! re-crossed (buffering, replays, seek-back) from firing the break again.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::types::{AdBreak, BreakPosition};

/// Sequencer lifecycle states
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SequencerState {
    /// No break active
    Idle,
    /// A break is due and about to start
    #[serde(rename_all = "camelCase")]
    AwaitingBreak { position: BreakPosition },
    /// A break is playing the ad at `ad_index`
    #[serde(rename_all = "camelCase")]
    PlayingBreak { ad_break: AdBreak, ad_index: usize },
    /// Every ad in the break has finished; resume logic runs next
    #[serde(rename_all = "camelCase")]
    BreakComplete {
        break_id: String,
        position: BreakPosition,
    },
}

/// Break scheduler for one ad session
#[derive(Debug)]
pub struct AdBreakSequencer {
    /// Configured breaks in declaration order
    breaks: Vec<AdBreak>,
    state: SequencerState,
    /// Positions consumed this content item (pre-roll, post-roll)
    played_positions: HashSet<BreakPosition>,
    /// Break ids consumed this content item
    played_break_ids: HashSet<String>,
}

impl AdBreakSequencer {
    pub fn new(breaks: Vec<AdBreak>) -> Self {
        Self {
            breaks,
            state: SequencerState::Idle,
            played_positions: HashSet::new(),
            played_break_ids: HashSet::new(),
        }
    }

    pub fn state(&self) -> &SequencerState {
        &self.state
    }

    /// A break is starting, playing, or wrapping up
    pub fn is_break_active(&self) -> bool {
        self.state != SequencerState::Idle
    }

    /// Has this break id played for the current content item
    pub fn has_played(&self, break_id: &str) -> bool {
        self.played_break_ids.contains(break_id)
    }

    /// The pre-roll break that should intercept the first content play
    pub fn pending_pre_roll(&self) -> Option<&AdBreak> {
        if self.played_positions.contains(&BreakPosition::PreRoll) {
            return None;
        }
        self.breaks.iter().find(|b| {
            b.position == BreakPosition::PreRoll
                && !b.is_empty()
                && !self.played_break_ids.contains(&b.id)
        })
    }

    /// The mid-roll break due at `position`, if any.
    ///
    /// When several unplayed breaks are due at once, the lowest trigger time
    /// wins; the next one starts on a later tick after content resumes.
    pub fn due_mid_roll(&self, position: f64) -> Option<&AdBreak> {
        self.breaks
            .iter()
            .filter(|b| {
                b.position == BreakPosition::MidRoll
                    && !b.is_empty()
                    && !self.played_break_ids.contains(&b.id)
                    && b.trigger_time.is_some_and(|t| position >= t)
            })
            .min_by(|a, b| {
                a.trigger_time
                    .partial_cmp(&b.trigger_time)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }

    /// The post-roll break that should play after content ends
    pub fn pending_post_roll(&self) -> Option<&AdBreak> {
        if self.played_positions.contains(&BreakPosition::PostRoll) {
            return None;
        }
        self.breaks.iter().find(|b| {
            b.position == BreakPosition::PostRoll
                && !b.is_empty()
                && !self.played_break_ids.contains(&b.id)
        })
    }

    /// A break was selected and is about to start
    pub fn arm(&mut self, position: BreakPosition) {
        self.state = SequencerState::AwaitingBreak { position };
    }

    /// Start playing a break from its first ad.
    ///
    /// Scheduled breaks consume their position slot; manual breaks only
    /// consume their id, so a host-triggered break never blocks a scheduled
    /// pre/post-roll.
    pub fn begin(&mut self, ad_break: AdBreak, manual: bool) {
        if matches!(self.state, SequencerState::PlayingBreak { .. }) {
            warn!(break_id = %ad_break.id, "Break already playing, ignoring begin");
            return;
        }

        self.played_break_ids.insert(ad_break.id.clone());
        if !manual && ad_break.position != BreakPosition::MidRoll {
            self.played_positions.insert(ad_break.position);
        }

        debug!(
            break_id = %ad_break.id,
            position = %ad_break.position,
            ads = ad_break.ads.len(),
            manual,
            "Break started"
        );
        self.state = SequencerState::PlayingBreak {
            ad_break,
            ad_index: 0,
        };
    }

    /// The break and index currently playing
    pub fn current(&self) -> Option<(&AdBreak, usize)> {
        match &self.state {
            SequencerState::PlayingBreak { ad_break, ad_index } => Some((ad_break, *ad_index)),
            _ => None,
        }
    }

    /// Move to the next ad in the break.
    ///
    /// Returns the new index, or `None` when the break is exhausted (state
    /// becomes [`SequencerState::BreakComplete`]).
    pub fn advance(&mut self) -> Option<usize> {
        let SequencerState::PlayingBreak { ad_break, ad_index } = &mut self.state else {
            return None;
        };

        if *ad_index + 1 < ad_break.ads.len() {
            *ad_index += 1;
            debug!(break_id = %ad_break.id, ad_index = *ad_index, "Advancing to next ad");
            Some(*ad_index)
        } else {
            debug!(break_id = %ad_break.id, "Break exhausted");
            self.state = SequencerState::BreakComplete {
                break_id: ad_break.id.clone(),
                position: ad_break.position,
            };
            None
        }
    }

    /// Resume handling is done; back to idle
    pub fn finish(&mut self) {
        self.state = SequencerState::Idle;
    }

    /// Hard-cancel whatever is in flight.
    ///
    /// The break keeps its played mark: an aborted break does not come back.
    pub fn abort(&mut self) {
        if self.state != SequencerState::Idle {
            debug!("Sequencer aborted");
        }
        self.state = SequencerState::Idle;
    }

    /// Content item changed; all bookkeeping starts over
    pub fn reset(&mut self) {
        self.state = SequencerState::Idle;
        self.played_positions.clear();
        self.played_break_ids.clear();
    }
}
