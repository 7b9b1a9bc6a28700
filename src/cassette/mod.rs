//! In-memory interaction store
//!
//! A [`Cassette`] holds interactions available for playback and collects the
//! ones recorded while it is inserted. Cassettes are stacked; lookups always
//! go to the innermost one.

mod interactions;
mod matcher;

pub use interactions::{HttpInteraction, HttpInteractionList, PlaybackStats};
pub use matcher::{fingerprint_request, MatchOn, DEFAULT_MATCH_ON};

use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::request::{Request, Response};
use crate::{Result, RewindError};

/// Maximum cassette name length in bytes
pub const MAX_NAME_LEN: usize = 255;

/// When a cassette records new interactions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordMode {
    /// Record only if the cassette started without interactions
    #[default]
    Once,
    /// Replay existing interactions and record new ones
    NewEpisodes,
    /// Replay only, never record
    None,
    /// Never replay, always record
    All,
}

/// Cassette behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CassetteOptions {
    /// Recording mode
    #[serde(default)]
    pub record: RecordMode,
    /// Request components used for matching
    #[serde(default = "default_match_on")]
    pub match_requests_on: Vec<MatchOn>,
    /// Allow an interaction to be played back more than once
    #[serde(default)]
    pub allow_playback_repeats: bool,
}

fn default_match_on() -> Vec<MatchOn> {
    DEFAULT_MATCH_ON.to_vec()
}

impl Default for CassetteOptions {
    fn default() -> Self {
        Self {
            record: RecordMode::default(),
            match_requests_on: default_match_on(),
            allow_playback_repeats: false,
        }
    }
}

/// A named set of interactions
pub struct Cassette {
    name: String,
    options: CassetteOptions,
    interactions: HttpInteractionList,
    new_recorded: Vec<HttpInteraction>,
    started_empty: bool,
}

impl Cassette {
    /// Create an empty cassette
    ///
    /// # Errors
    ///
    /// Returns error if the name is invalid
    pub fn new(name: &str, options: CassetteOptions) -> Result<Self> {
        Self::with_interactions(name, options, Vec::new())
    }

    /// Create a cassette preloaded with previously recorded interactions
    ///
    /// In [`RecordMode::All`] the interactions are never played back.
    ///
    /// # Errors
    ///
    /// Returns error if the name is invalid
    pub fn with_interactions(
        name: &str,
        options: CassetteOptions,
        interactions: Vec<HttpInteraction>,
    ) -> Result<Self> {
        validate_cassette_name(name)?;

        let started_empty = interactions.is_empty();
        let playable = if options.record == RecordMode::All {
            Vec::new()
        } else {
            interactions
        };

        Ok(Self {
            name: name.to_string(),
            interactions: HttpInteractionList::new(
                playable,
                options.match_requests_on.clone(),
                options.allow_playback_repeats,
            ),
            options,
            new_recorded: Vec::new(),
            started_empty,
        })
    }

    /// Cassette name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cassette options
    #[must_use]
    pub fn options(&self) -> &CassetteOptions {
        &self.options
    }

    /// Whether live interactions are recorded into this cassette
    #[must_use]
    pub fn is_recording(&self) -> bool {
        match self.options.record {
            RecordMode::All | RecordMode::NewEpisodes => true,
            RecordMode::None => false,
            RecordMode::Once => self.started_empty,
        }
    }

    /// Whether a playable interaction matches the request
    #[must_use]
    pub fn has_interaction_matching(&self, request: &Request) -> bool {
        self.interactions.has_interaction_matching(request)
    }

    /// Take the stored response for the request
    pub fn response_for(&mut self, request: &Request) -> Option<Response> {
        self.interactions.response_for(request)
    }

    /// Record a live interaction; ignored unless the cassette is recording
    ///
    /// Returns whether the interaction was kept.
    pub fn record(&mut self, request: &Request, response: &Response) -> bool {
        if !self.is_recording() {
            debug!("Cassette '{}' is not recording; dropping {}", self.name, request);
            return false;
        }

        self.new_recorded
            .push(HttpInteraction::new(request.clone(), response.clone()));
        debug!(
            "Recorded {} into cassette '{}' (count: {})",
            request,
            self.name,
            self.new_recorded.len()
        );
        true
    }

    /// Interactions recorded while this cassette was inserted
    #[must_use]
    pub fn new_recorded_interactions(&self) -> &[HttpInteraction] {
        &self.new_recorded
    }

    /// Take ownership of the recorded interactions
    #[must_use]
    pub fn into_recorded_interactions(self) -> Vec<HttpInteraction> {
        self.new_recorded
    }

    /// Playback list
    #[must_use]
    pub fn interactions(&self) -> &HttpInteractionList {
        &self.interactions
    }
}

/// Stack of inserted cassettes
#[derive(Default)]
pub struct CassetteStack {
    cassettes: RwLock<Vec<Cassette>>,
}

impl CassetteStack {
    /// Create an empty stack
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a cassette on top of the stack
    ///
    /// # Errors
    ///
    /// Returns error if a cassette with the same name is already inserted
    pub fn insert(&self, cassette: Cassette) -> Result<()> {
        let mut cassettes = self.write();

        if cassettes.iter().any(|c| c.name == cassette.name) {
            return Err(RewindError::CassetteInUse(cassette.name));
        }

        info!(
            "Inserted cassette '{}' ({} interactions, record: {:?})",
            cassette.name,
            cassette.interactions.len(),
            cassette.options.record
        );
        cassettes.push(cassette);
        Ok(())
    }

    /// Remove and return the innermost cassette
    pub fn eject(&self) -> Option<Cassette> {
        let cassette = self.write().pop()?;
        info!(
            "Ejected cassette '{}' ({} new interactions, {} unused)",
            cassette.name,
            cassette.new_recorded.len(),
            cassette.interactions.remaining_unused_count()
        );
        Some(cassette)
    }

    /// Name of the innermost cassette
    #[must_use]
    pub fn current_name(&self) -> Option<String> {
        self.read().last().map(|c| c.name.clone())
    }

    /// Recording state of the innermost cassette, if any
    #[must_use]
    pub fn current_recording(&self) -> Option<bool> {
        self.read().last().map(Cassette::is_recording)
    }

    /// Number of inserted cassettes
    #[must_use]
    pub fn depth(&self) -> usize {
        self.read().len()
    }

    /// Whether the innermost cassette has a matching interaction
    #[must_use]
    pub fn has_interaction_matching(&self, request: &Request) -> bool {
        self.read()
            .last()
            .is_some_and(|c| c.has_interaction_matching(request))
    }

    /// Take a stored response from the innermost cassette
    pub fn response_for(&self, request: &Request) -> Option<Response> {
        self.write().last_mut()?.response_for(request)
    }

    /// Record into the innermost cassette; returns whether it was kept
    pub fn record(&self, request: &Request, response: &Response) -> bool {
        self.write()
            .last_mut()
            .is_some_and(|c| c.record(request, response))
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Cassette>> {
        self.cassettes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Cassette>> {
        self.cassettes.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Validate a cassette name
///
/// # Errors
///
/// Returns error if the name is invalid
pub fn validate_cassette_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(RewindError::InvalidCassetteName(
            "Cassette name cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_NAME_LEN {
        return Err(RewindError::InvalidCassetteName(format!(
            "Cassette name too long: {} > {MAX_NAME_LEN}",
            name.len()
        )));
    }

    if name.starts_with('.') {
        return Err(RewindError::InvalidCassetteName(
            "Cassette name cannot start with dot".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(RewindError::InvalidCassetteName(
            "Cassette name cannot contain null bytes".to_string(),
        ));
    }

    if name.contains("..") {
        return Err(RewindError::InvalidCassetteName(
            "Cassette name cannot contain '..'".to_string(),
        ));
    }

    Ok(())
}
