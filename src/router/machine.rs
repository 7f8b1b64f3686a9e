//! Core router state machine implementation
//!
//! Processes one message at a time from a single mpsc channel, so fragment
//! handling, manual UI actions, and timeout checks never race. Transitions
//! between IdleNoSection, SectionActive, and CommandSuspected based on what
//! each fragment looks like.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::command::{CommandMatch, CommandMatcher, HistoryBuffer};
use crate::events::RouterEvent;
use crate::store::SectionStore;
use crate::text::normalize;

/// The three possible routing states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterState {
    /// No section selected yet, content fragments are dropped
    IdleNoSection,
    /// A section is active, content fragments replace its text
    SectionActive,
    /// A command may be in progress, fragments are withheld from commit
    CommandSuspected,
}

impl Default for RouterState {
    fn default() -> Self {
        Self::IdleNoSection
    }
}

impl std::fmt::Display for RouterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouterState::IdleNoSection => write!(f, "IdleNoSection"),
            RouterState::SectionActive => write!(f, "SectionActive"),
            RouterState::CommandSuspected => write!(f, "CommandSuspected"),
        }
    }
}

/// Messages consumed by the router's serialized loop
#[derive(Debug)]
pub enum RouterMsg {
    /// A recognizer fragment arrived
    Fragment(String),
    /// Manual section selection from the UI
    SelectSection(String),
    /// Manual content edit of the active section
    SetContent(String),
    /// Whole-document reset
    ResetDocument,
    /// Periodic check from the timeout monitor
    TimeoutCheck,
}

/// Snapshot of the router's externally visible state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterStatus {
    /// Current routing state
    pub state: RouterState,
    /// Display name of the active section, if any
    pub active_section: Option<String>,
}

/// The command/dictation router
pub struct Router {
    /// Current state
    state: RouterState,
    /// Active section's catalogue display name
    active_section: Option<String>,
    /// Fixed, ordered section catalogue
    catalogue: Vec<String>,
    matcher: CommandMatcher,
    history: HistoryBuffer,
    store: Box<dyn SectionStore>,
    /// Inactivity window after which command suspicion is abandoned
    suspicion_timeout: Duration,
    /// Time of the last fragment while suspecting a command
    last_activity: Option<Instant>,
    /// Channel for emitting router events
    event_tx: broadcast::Sender<RouterEvent>,
    /// Shared snapshot read by the IPC server
    status: Arc<RwLock<RouterStatus>>,
}

impl Router {
    /// Create a router over the given catalogue and store.
    pub fn new(
        catalogue: Vec<String>,
        store: Box<dyn SectionStore>,
        history_capacity: usize,
        suspicion_timeout: Duration,
        event_tx: broadcast::Sender<RouterEvent>,
    ) -> Self {
        Self {
            state: RouterState::IdleNoSection,
            active_section: None,
            catalogue,
            matcher: CommandMatcher::new(),
            history: HistoryBuffer::new(history_capacity),
            store,
            suspicion_timeout,
            last_activity: None,
            event_tx,
            status: Arc::new(RwLock::new(RouterStatus::default())),
        }
    }

    /// Get the current state
    pub fn state(&self) -> RouterState {
        self.state
    }

    /// Display name of the active section, if any
    pub fn active_section(&self) -> Option<&str> {
        self.active_section.as_deref()
    }

    /// Shared status snapshot, updated after every processed message.
    pub fn status_handle(&self) -> Arc<RwLock<RouterStatus>> {
        Arc::clone(&self.status)
    }

    /// Run the router, draining messages until the channel closes.
    pub async fn run(&mut self, mut msg_rx: mpsc::Receiver<RouterMsg>) {
        info!(state = %self.state, "router started");

        while let Some(msg) = msg_rx.recv().await {
            match msg {
                RouterMsg::Fragment(text) => self.handle_fragment(&text),
                RouterMsg::SelectSection(name) => self.select_section(&name),
                RouterMsg::SetContent(text) => self.set_active_content(&text),
                RouterMsg::ResetDocument => self.reset_document(),
                RouterMsg::TimeoutCheck => {
                    self.check_suspicion_timeout(Instant::now());
                }
            }
            self.publish_status().await;
        }

        info!("router stopped");
    }

    /// Handle one recognizer fragment.
    ///
    /// Decision order: direct command match, command recovered from
    /// history, command-prefix suspicion, suspicion hold, trigger-word
    /// scan, content commit.
    pub fn handle_fragment(&mut self, fragment: &str) {
        if fragment.trim().is_empty() {
            return;
        }

        debug!(fragment, state = %self.state, "fragment received");
        self.history.push(fragment);
        let normalized = normalize(fragment);

        // Direct command in this fragment alone.
        if let Some(m) = self.matcher.find_match(&normalized) {
            debug!(grammar = m.grammar, target = %m.target, "command matched");
            self.resolve_target(&m, false);
            return;
        }

        // Command split across recent fragments.
        if let Some(m) = self.history.find_command(&self.matcher) {
            debug!(
                grammar = m.grammar,
                target = %m.target,
                "command recovered from history"
            );
            self.resolve_target(&m, true);
            return;
        }

        // Looks like the start of a command; wait for more fragments.
        if self.matcher.is_potential_command_prefix(&normalized) {
            self.enter_suspicion(fragment);
            return;
        }

        // Already suspecting: keep withholding until resolution or timeout.
        if self.state == RouterState::CommandSuspected {
            self.last_activity = Some(Instant::now());
            debug!(fragment, "still suspecting a command, fragment withheld");
            return;
        }

        // Trigger word anywhere in the fragment: never commit it as content.
        if let Some(trigger) = self.matcher.contains_trigger(&normalized) {
            info!(trigger, fragment, "trigger word found, withholding fragment");
            self.enter_suspicion(fragment);
            return;
        }

        // Plain dictation.
        match self.active_section.clone() {
            Some(name) => self.commit(&name, fragment),
            None => {
                info!(fragment, "no section selected, fragment dropped");
                self.emit(RouterEvent::NoActiveSection {
                    fragment: fragment.to_string(),
                });
            }
        }
    }

    /// Manual section selection, resolved like a command target.
    pub fn select_section(&mut self, name: &str) {
        let target = normalize(name);
        match self.find_section(&target) {
            Some(i) => self.activate(i),
            None => {
                warn!(name, "manual selection matches no catalogue section");
                self.emit(RouterEvent::CommandRejected { target });
            }
        }
    }

    /// Manual edit of the active section's content.
    pub fn set_active_content(&mut self, text: &str) {
        match self.active_section.clone() {
            Some(name) => self.commit(&name, text),
            None => {
                info!("content edit with no section selected");
                self.emit(RouterEvent::NoActiveSection {
                    fragment: text.to_string(),
                });
            }
        }
    }

    /// Reset every section to empty and return to the initial state.
    pub fn reset_document(&mut self) {
        if let Err(e) = self.store.reset() {
            error!(error = %e, "document reset failed");
            return;
        }
        self.state = RouterState::IdleNoSection;
        self.active_section = None;
        self.last_activity = None;
        self.history.clear();
        info!("document reset, no section selected");
    }

    /// Abandon command suspicion if it has been inactive past the timeout.
    ///
    /// The history buffer is kept: its fragments may still complete a
    /// future command attempt.
    pub fn check_suspicion_timeout(&mut self, now: Instant) {
        if self.state != RouterState::CommandSuspected {
            return;
        }
        let Some(last) = self.last_activity else {
            return;
        };
        if now.saturating_duration_since(last) > self.suspicion_timeout {
            info!("command suspicion timed out");
            self.leave_suspicion();
            self.emit(RouterEvent::SuspicionExpired);
        }
    }

    /// Resolve a matched command target to a catalogue section.
    ///
    /// The triggering fragment is consumed by the command either way and is
    /// never committed as content.
    fn resolve_target(&mut self, m: &CommandMatch, from_history: bool) {
        match self.find_section(&m.target) {
            Some(i) => {
                // The consumed command fragments must not feed a later match.
                self.history.clear();
                self.activate(i);
            }
            None => {
                warn!(target = %m.target, "no section matches command target");
                if from_history {
                    self.history.clear();
                }
                self.leave_suspicion();
                self.emit(RouterEvent::CommandRejected {
                    target: m.target.clone(),
                });
            }
        }
    }

    /// First catalogue section whose normalized name starts with the
    /// normalized target phrase, in catalogue order.
    fn find_section(&self, target: &str) -> Option<usize> {
        if target.is_empty() {
            return None;
        }
        self.catalogue
            .iter()
            .position(|name| normalize(name).starts_with(target))
    }

    /// Make the catalogue section at `i` active.
    ///
    /// The history buffer is left alone here: manual selection must not
    /// discard fragments of a spoken command still in flight. Voice
    /// activation clears it in `resolve_target`.
    fn activate(&mut self, i: usize) {
        let name = self.catalogue[i].clone();
        let text = match self.store.get(&name) {
            Ok(text) => text,
            Err(e) => {
                warn!(section = %name, error = %e, "failed to load section content");
                String::new()
            }
        };

        let old_state = self.state;
        self.state = RouterState::SectionActive;
        self.active_section = Some(name.clone());
        self.last_activity = None;

        info!(from = %old_state, to = %self.state, section = %name, "switched section");
        self.emit(RouterEvent::SectionActivated { name, text });
    }

    /// Replace a section's stored text with the given fragment.
    fn commit(&mut self, name: &str, text: &str) {
        if let Err(e) = self.store.set(name, text) {
            // Not rolled back: the in-memory view may already show the text.
            error!(section = name, error = %e, "section write failed");
            return;
        }
        info!(section = name, "content committed");
        self.emit(RouterEvent::ContentCommitted {
            name: name.to_string(),
            text: text.to_string(),
        });
    }

    /// Enter the suspected-command state and withhold the fragment.
    fn enter_suspicion(&mut self, fragment: &str) {
        let old_state = self.state;
        self.state = RouterState::CommandSuspected;
        self.last_activity = Some(Instant::now());
        debug!(from = %old_state, fragment, "potential command, buffering");
        self.emit(RouterEvent::CommandSuspected {
            fragment: fragment.to_string(),
        });
    }

    /// Drop suspicion, returning to whichever state the active section
    /// implies. `active_section` is preserved.
    fn leave_suspicion(&mut self) {
        self.state = if self.active_section.is_some() {
            RouterState::SectionActive
        } else {
            RouterState::IdleNoSection
        };
        self.last_activity = None;
    }

    async fn publish_status(&self) {
        let mut status = self.status.write().await;
        status.state = self.state;
        status.active_section = self.active_section.clone();
    }

    fn emit(&self, event: RouterEvent) {
        debug!(%event, "emitting event");
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn catalogue() -> Vec<String> {
        [
            "Patient Information:",
            "LMP",
            "Gestational Age:",
            "Fetal Pole:",
            "Impression:",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn create_router() -> (Router, broadcast::Receiver<RouterEvent>) {
        let (tx, rx) = broadcast::channel(64);
        let sections = catalogue();
        let store = Box::new(MemoryStore::new(&sections));
        let router = Router::new(sections, store, 3, Duration::from_secs(3), tx);
        (router, rx)
    }

    fn drain(rx: &mut broadcast::Receiver<RouterEvent>) -> Vec<RouterEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_initial_state() {
        let (router, _) = create_router();
        assert_eq!(router.state(), RouterState::IdleNoSection);
        assert_eq!(router.active_section(), None);
    }

    #[test]
    fn test_direct_command_activates_every_section() {
        for name in catalogue() {
            let (mut router, _) = create_router();
            router.handle_fragment(&format!("go to {}", normalize(&name)));
            assert_eq!(router.state(), RouterState::SectionActive);
            assert_eq!(router.active_section(), Some(name.as_str()));
        }
    }

    #[test]
    fn test_split_command_activates_without_committing() {
        let (mut router, mut rx) = create_router();
        router.handle_fragment("go");
        assert_eq!(router.state(), RouterState::CommandSuspected);

        router.handle_fragment("to patient information");
        assert_eq!(router.state(), RouterState::SectionActive);
        assert_eq!(router.active_section(), Some("Patient Information:"));
        assert_eq!(router.store.get("Patient Information:").unwrap(), "");

        let events = drain(&mut rx);
        assert!(!events
            .iter()
            .any(|e| matches!(e, RouterEvent::ContentCommitted { .. })));
    }

    #[test]
    fn test_content_commit_replaces_text() {
        let (mut router, _) = create_router();
        router.handle_fragment("go to lmp");
        router.handle_fragment("first of march");
        assert_eq!(router.store.get("LMP").unwrap(), "first of march");

        router.handle_fragment("fifth of march");
        assert_eq!(router.store.get("LMP").unwrap(), "fifth of march");
    }

    #[test]
    fn test_trigger_word_is_never_committed() {
        let (mut router, mut rx) = create_router();
        router.handle_fragment("go to impression");
        router.handle_fragment("please go to the doctor");

        assert_eq!(router.state(), RouterState::CommandSuspected);
        assert_eq!(router.store.get("Impression:").unwrap(), "");
        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, RouterEvent::CommandSuspected { .. })));
        assert!(!events
            .iter()
            .any(|e| matches!(e, RouterEvent::ContentCommitted { .. })));
    }

    #[test]
    fn test_timeout_reverts_suspicion_and_preserves_section() {
        let (mut router, mut rx) = create_router();
        router.handle_fragment("go to fetal pole");
        router.handle_fragment("please go to the doctor");
        assert_eq!(router.state(), RouterState::CommandSuspected);

        // Within the timeout nothing changes.
        router.check_suspicion_timeout(Instant::now() + Duration::from_secs(1));
        assert_eq!(router.state(), RouterState::CommandSuspected);

        router.check_suspicion_timeout(Instant::now() + Duration::from_secs(4));
        assert_eq!(router.state(), RouterState::SectionActive);
        assert_eq!(router.active_section(), Some("Fetal Pole:"));
        assert!(drain(&mut rx)
            .iter()
            .any(|e| matches!(e, RouterEvent::SuspicionExpired)));
    }

    #[test]
    fn test_timeout_without_active_section_goes_idle() {
        let (mut router, _) = create_router();
        router.handle_fragment("going over the notes now");
        assert_eq!(router.state(), RouterState::CommandSuspected);

        router.check_suspicion_timeout(Instant::now() + Duration::from_secs(4));
        assert_eq!(router.state(), RouterState::IdleNoSection);
        assert_eq!(router.active_section(), None);
    }

    #[test]
    fn test_suspicion_holds_fragments_until_timeout() {
        let (mut router, _) = create_router();
        router.handle_fragment("go to impression");
        router.handle_fragment("please go to the doctor");
        // No grammar matches anywhere in history, so this is held too.
        router.handle_fragment("she was seen yesterday");
        assert_eq!(router.state(), RouterState::CommandSuspected);
        assert_eq!(router.store.get("Impression:").unwrap(), "");
    }

    #[test]
    fn test_gestational_age_scenario() {
        let (tx, _rx) = broadcast::channel(16);
        let sections = vec!["LMP".to_string(), "Gestational Age:".to_string()];
        let store = Box::new(MemoryStore::new(&sections));
        let mut router = Router::new(sections, store, 3, Duration::from_secs(3), tx);

        router.handle_fragment("go to gestational age");
        router.handle_fragment("thirty two weeks");

        assert_eq!(router.active_section(), Some("Gestational Age:"));
        assert_eq!(
            router.store.get("Gestational Age:").unwrap(),
            "thirty two weeks"
        );
    }

    #[test]
    fn test_command_does_not_complete_across_timeout() {
        let (mut router, mut rx) = create_router();
        // "go to" alone matches the generic "go" grammar with target "to",
        // which resolves to no section.
        router.handle_fragment("go to");
        assert!(drain(&mut rx)
            .iter()
            .any(|e| matches!(e, RouterEvent::CommandRejected { .. })));

        router.check_suspicion_timeout(Instant::now() + Duration::from_secs(4));

        // The late fragment is dropped; no section ever activates.
        router.handle_fragment("lmp");
        assert_eq!(router.state(), RouterState::IdleNoSection);
        assert_eq!(router.active_section(), None);
        let events = drain(&mut rx);
        assert!(!events
            .iter()
            .any(|e| matches!(e, RouterEvent::SectionActivated { .. })));
        assert!(!events
            .iter()
            .any(|e| matches!(e, RouterEvent::ContentCommitted { .. })));
    }

    #[test]
    fn test_no_active_section_notice() {
        let (mut router, mut rx) = create_router();
        router.handle_fragment("thirty two weeks");
        assert!(drain(&mut rx)
            .iter()
            .any(|e| matches!(e, RouterEvent::NoActiveSection { .. })));
        assert_eq!(router.state(), RouterState::IdleNoSection);
    }

    #[test]
    fn test_empty_fragments_ignored() {
        let (mut router, mut rx) = create_router();
        router.handle_fragment("");
        router.handle_fragment("   ");
        assert_eq!(router.state(), RouterState::IdleNoSection);
        assert!(drain(&mut rx).is_empty());
        assert!(router.history.is_empty());
    }

    #[test]
    fn test_unresolved_target_drops_fragment_and_clears_suspicion() {
        let (mut router, mut rx) = create_router();
        router.handle_fragment("go to blood pressure");
        assert_eq!(router.state(), RouterState::IdleNoSection);
        assert!(drain(&mut rx).iter().any(
            |e| matches!(e, RouterEvent::CommandRejected { target } if target == "blood pressure")
        ));
    }

    #[test]
    fn test_prefix_resolution_first_in_catalogue_wins() {
        let (tx, _rx) = broadcast::channel(16);
        let sections = vec![
            "Fetal Pole:".to_string(),
            "Fetal Heart Rate:".to_string(),
        ];
        let store = Box::new(MemoryStore::new(&sections));
        let mut router = Router::new(sections, store, 3, Duration::from_secs(3), tx);

        router.handle_fragment("go to fetal");
        assert_eq!(router.active_section(), Some("Fetal Pole:"));
    }

    #[test]
    fn test_manual_selection_and_edit() {
        let (mut router, mut rx) = create_router();
        router.select_section("Impression:");
        assert_eq!(router.state(), RouterState::SectionActive);
        assert_eq!(router.active_section(), Some("Impression:"));

        router.set_active_content("viable intrauterine pregnancy");
        assert_eq!(
            router.store.get("Impression:").unwrap(),
            "viable intrauterine pregnancy"
        );
        assert!(drain(&mut rx)
            .iter()
            .any(|e| matches!(e, RouterEvent::ContentCommitted { .. })));
    }

    #[test]
    fn test_manual_selection_keeps_pending_split_command() {
        let (mut router, _) = create_router();
        // First half of a spoken command, then a manual click before the
        // second half arrives.
        router.handle_fragment("go");
        router.select_section("LMP");
        assert_eq!(router.active_section(), Some("LMP"));

        // The second half still completes the command from history.
        router.handle_fragment("patient information");
        assert_eq!(router.active_section(), Some("Patient Information:"));
        assert_eq!(router.store.get("LMP").unwrap(), "");
    }

    #[test]
    fn test_reset_clears_sections_and_state() {
        let (mut router, _) = create_router();
        router.handle_fragment("go to lmp");
        router.handle_fragment("first of march");
        router.reset_document();

        assert_eq!(router.state(), RouterState::IdleNoSection);
        assert_eq!(router.active_section(), None);
        assert_eq!(router.store.get("LMP").unwrap(), "");
    }

    #[test]
    fn test_activation_clears_history() {
        let (mut router, _) = create_router();
        router.handle_fragment("go to lmp");
        assert!(router.history.is_empty());
        // Follow-up dictation is not misread against stale history.
        router.handle_fragment("first of march");
        assert_eq!(router.store.get("LMP").unwrap(), "first of march");
    }
}
