//! Playback list of recorded interactions

use std::fmt;
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::request::{Request, Response};

use super::matcher::{fingerprint_request, MatchOn};

/// A recorded request/response pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpInteraction {
    /// The request as it was sent
    pub request: Request,
    /// The response it received
    pub response: Response,
    /// When the interaction was recorded
    pub recorded_at: SystemTime,
}

impl HttpInteraction {
    /// Create an interaction recorded now
    #[must_use]
    pub fn new(request: Request, response: Response) -> Self {
        Self {
            request,
            response,
            recorded_at: SystemTime::now(),
        }
    }
}

impl fmt::Display for HttpInteraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({} bytes)",
            self.request,
            self.response.status,
            self.response.body.len()
        )
    }
}

struct Entry {
    fingerprint: [u8; 32],
    interaction: HttpInteraction,
    used: bool,
}

/// Interactions available for playback, each consumed once unless playback
/// repeats are allowed
pub struct HttpInteractionList {
    entries: Vec<Entry>,
    match_on: Vec<MatchOn>,
    allow_playback_repeats: bool,
    hits: usize,
    misses: usize,
}

impl HttpInteractionList {
    /// Build a list from recorded interactions
    #[must_use]
    pub fn new(
        interactions: Vec<HttpInteraction>,
        match_on: Vec<MatchOn>,
        allow_playback_repeats: bool,
    ) -> Self {
        let entries = interactions
            .into_iter()
            .map(|interaction| Entry {
                fingerprint: fingerprint_request(&interaction.request, &match_on),
                interaction,
                used: false,
            })
            .collect();

        Self {
            entries,
            match_on,
            allow_playback_repeats,
            hits: 0,
            misses: 0,
        }
    }

    /// Whether a playable interaction matches the request
    ///
    /// Does not consume anything.
    #[must_use]
    pub fn has_interaction_matching(&self, request: &Request) -> bool {
        let fingerprint = fingerprint_request(request, &self.match_on);
        self.entries
            .iter()
            .any(|entry| entry.fingerprint == fingerprint && (!entry.used || self.allow_playback_repeats))
    }

    /// Take the response of the first matching interaction
    ///
    /// Unused interactions are preferred; already played ones are only
    /// returned again when playback repeats are allowed.
    pub fn response_for(&mut self, request: &Request) -> Option<Response> {
        let fingerprint = fingerprint_request(request, &self.match_on);

        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| !entry.used && entry.fingerprint == fingerprint)
        {
            entry.used = true;
            self.hits += 1;
            debug!(
                "Playing back {} (fingerprint: {})",
                request,
                hex::encode(&fingerprint[..8])
            );
            return Some(entry.interaction.response.clone());
        }

        if self.allow_playback_repeats {
            if let Some(entry) = self
                .entries
                .iter()
                .find(|entry| entry.fingerprint == fingerprint)
            {
                self.hits += 1;
                debug!("Repeating playback of {}", request);
                return Some(entry.interaction.response.clone());
            }
        }

        self.misses += 1;
        warn!(
            "No playable interaction for {} (fingerprint: {})",
            request,
            hex::encode(&fingerprint[..8])
        );
        None
    }

    /// Number of interactions not yet played back
    #[must_use]
    pub fn remaining_unused_count(&self) -> usize {
        self.entries.iter().filter(|entry| !entry.used).count()
    }

    /// Interactions not yet played back
    pub fn unused_interactions(&self) -> impl Iterator<Item = &HttpInteraction> {
        self.entries
            .iter()
            .filter(|entry| !entry.used)
            .map(|entry| &entry.interaction)
    }

    /// Playback statistics
    #[must_use]
    pub fn stats(&self) -> PlaybackStats {
        let total = self.hits + self.misses;
        PlaybackStats {
            hits: self.hits,
            misses: self.misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                self.hits as f64 / total as f64
            },
            size: self.entries.len(),
            unused: self.remaining_unused_count(),
        }
    }

    /// Number of interactions in the list
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the list holds no interactions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Playback statistics
#[derive(Debug, Clone, Copy)]
pub struct PlaybackStats {
    /// Lookups that produced a response
    pub hits: usize,
    /// Lookups that produced nothing
    pub misses: usize,
    /// Hit rate (0.0 to 1.0)
    pub hit_rate: f64,
    /// Interactions in the list
    pub size: usize,
    /// Interactions not yet played back
    pub unused: usize,
}
