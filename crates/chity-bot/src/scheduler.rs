//! Weighted random behavior loop of a synthetic user.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

use crate::config::BehaviorConfig;
use crate::state::{ClientState, Outbox, SharedState};
use crate::{Error, Result};

pub const ACTION_COUNT: usize = 4;

const PUBLIC_GROUP_PROBABILITY: f64 = 0.8;

const WORDS: &[&str] = &[
    "hello", "there", "how", "is", "everyone", "doing", "today", "the", "weather", "looks",
    "nice", "anyone", "up", "for", "lunch", "just", "pushed", "a", "fix", "server", "feels",
    "fast", "slow", "again", "good", "morning", "night", "what", "do", "you", "think",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Send a message to the current group.
    SendMessage,
    /// Ask for the public group directory.
    RequestPublicGroups,
    /// Pick a new current group among the known ones.
    SelectGroup,
    CreateGroup,
}

impl Action {
    /// All actions, in the order used by weights and counters.
    pub const ALL: [Action; ACTION_COUNT] = [
        Action::SendMessage,
        Action::RequestPublicGroups,
        Action::SelectGroup,
        Action::CreateGroup,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Action::SendMessage => "send_message",
            Action::RequestPublicGroups => "request_public_groups",
            Action::SelectGroup => "select_group",
            Action::CreateGroup => "create_group",
        }
    }
}

/// Draws actions with replacement according to fixed weights.
#[derive(Debug, Clone)]
pub struct ActionPicker {
    dist: WeightedIndex<u32>,
}

impl ActionPicker {
    pub fn new(weights: &[u32; ACTION_COUNT]) -> Result<Self> {
        let dist = WeightedIndex::new(weights.iter().copied())
            .map_err(|e| Error::Logic(format!("invalid action weights {:?}: {}", weights, e)))?;
        Ok(Self { dist })
    }

    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Action {
        Action::ALL[self.dist.sample(rng)]
    }
}

pub struct Scheduler {
    picker: ActionPicker,
    min_delay_ms: u64,
    max_delay_ms: u64,
    rng: StdRng,
    messages_sent: u64,
    groups_created: u64,
}

impl Scheduler {
    pub fn new(config: &BehaviorConfig) -> Result<Self> {
        if config.min_delay_ms > config.max_delay_ms {
            return Err(Error::Logic(format!(
                "min_delay_ms {} exceeds max_delay_ms {}",
                config.min_delay_ms, config.max_delay_ms
            )));
        }
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            picker: ActionPicker::new(&config.weights)?,
            min_delay_ms: config.min_delay_ms,
            max_delay_ms: config.max_delay_ms,
            rng,
            messages_sent: 0,
            groups_created: 0,
        })
    }

    pub fn next_action(&mut self) -> Action {
        self.picker.pick(&mut self.rng)
    }

    pub fn next_delay(&mut self) -> Duration {
        Duration::from_millis(self.rng.gen_range(self.min_delay_ms..=self.max_delay_ms))
    }

    /// Carry out one action. Returns false if it was skipped for lack of a group.
    pub fn perform(&mut self, action: Action, state: &mut ClientState, outbox: &Outbox) -> Result<bool> {
        match action {
            Action::SendMessage => {
                let Some(group_id) = state.current_group else {
                    debug!("no current group, skipping message");
                    return Ok(false);
                };
                self.messages_sent += 1;
                let content = format!("{} #{}", self.sentence(), self.messages_sent);
                outbox.send_msg(group_id, content, Vec::new())?;
            }
            Action::RequestPublicGroups => outbox.get_all_groups()?,
            Action::SelectGroup => {
                let known = state.cache.group_ids();
                let Some(&group_id) = known.choose(&mut self.rng) else {
                    debug!("no known group to select");
                    return Ok(false);
                };
                debug!(group_id, "selected group");
                state.current_group = Some(group_id);
            }
            Action::CreateGroup => {
                self.groups_created += 1;
                let name = format!(
                    "{}'s room {}",
                    state.displayname().unwrap_or("bot"),
                    self.groups_created
                );
                let public = self.rng.gen_bool(PUBLIC_GROUP_PROBABILITY);
                outbox.create_group(name, public)?;
            }
        }
        state.stats.record(action);
        Ok(true)
    }

    /// Run until `running` turns false. The flag is checked once per iteration;
    /// a change also cuts the pending delay short.
    pub async fn run(
        &mut self,
        state: &SharedState,
        outbox: &Outbox,
        mut running: watch::Receiver<bool>,
    ) -> Result<()> {
        while *running.borrow_and_update() {
            let action = self.next_action();
            {
                let mut state = state.lock().await;
                self.perform(action, &mut state, outbox)?;
            }
            let delay = self.next_delay();
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = running.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("behavior loop stopped");
        Ok(())
    }

    fn sentence(&mut self) -> String {
        let len = self.rng.gen_range(3..=8);
        let words: Vec<&str> = (0..len)
            .filter_map(|_| WORDS.choose(&mut self.rng).copied())
            .collect();
        words.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Request;
    use crate::types::{Group, Status, User};

    fn config(weights: [u32; ACTION_COUNT]) -> BehaviorConfig {
        BehaviorConfig {
            weights,
            min_delay_ms: 0,
            max_delay_ms: 0,
            seed: Some(7),
        }
    }

    fn state_with_group() -> ClientState {
        let mut state = ClientState::default();
        state.cache.upsert_user(User {
            id: 1,
            username: "bot1".into(),
            displayname: "Bot 1".into(),
            bio: String::new(),
            created_at: String::new(),
            pfp_name: String::new(),
            status: Status::Online,
        });
        state.me = Some(1);
        state.cache.insert_group(Group::new(5, 1, "lobby", true, vec![1]));
        state.current_group = Some(5);
        state
    }

    #[test]
    fn test_weighted_draws_converge() {
        let picker = ActionPicker::new(&[500, 40, 40, 1]).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let draws = 200_000;
        let mut counts = [0u64; ACTION_COUNT];
        for _ in 0..draws {
            counts[picker.pick(&mut rng).index()] += 1;
        }

        let expected = [500.0 / 581.0, 40.0 / 581.0, 40.0 / 581.0, 1.0 / 581.0];
        for (count, p) in counts.iter().zip(expected) {
            let observed = *count as f64 / draws as f64;
            assert!((observed - p).abs() < 0.003, "observed {} expected {}", observed, p);
        }
    }

    #[test]
    fn test_invalid_weights_rejected() {
        assert!(matches!(ActionPicker::new(&[0, 0, 0, 0]), Err(Error::Logic(_))));
        let mut bad_delay = config([1, 1, 1, 1]);
        bad_delay.min_delay_ms = 10;
        bad_delay.max_delay_ms = 5;
        assert!(Scheduler::new(&bad_delay).is_err());
    }

    #[test]
    fn test_delay_within_bounds() {
        let mut scheduler = Scheduler::new(&BehaviorConfig {
            min_delay_ms: 100,
            max_delay_ms: 200,
            ..config([1, 0, 0, 0])
        })
        .unwrap();
        for _ in 0..1000 {
            let delay = scheduler.next_delay();
            assert!(delay >= Duration::from_millis(100) && delay <= Duration::from_millis(200));
        }
    }

    #[test]
    fn test_actions_needing_a_group_are_skipped() {
        let mut scheduler = Scheduler::new(&config([1, 1, 1, 1])).unwrap();
        let mut state = ClientState::default();
        let (outbox, mut rx) = Outbox::channel();

        assert!(!scheduler.perform(Action::SendMessage, &mut state, &outbox).unwrap());
        assert!(!scheduler.perform(Action::SelectGroup, &mut state, &outbox).unwrap());
        assert!(rx.try_recv().is_err());
        assert_eq!(state.stats.actions, [0; ACTION_COUNT]);
    }

    #[test]
    fn test_send_message_targets_current_group() {
        let mut scheduler = Scheduler::new(&config([1, 0, 0, 0])).unwrap();
        let mut state = state_with_group();
        let (outbox, mut rx) = Outbox::channel();

        assert!(scheduler.perform(Action::SendMessage, &mut state, &outbox).unwrap());
        assert!(scheduler.perform(Action::SendMessage, &mut state, &outbox).unwrap());

        match rx.try_recv().unwrap() {
            Request::GroupMsg { group_id, content, attachments } => {
                assert_eq!(group_id, 5);
                assert!(content.ends_with(" #1"), "{}", content);
                assert!(attachments.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            rx.try_recv().unwrap(),
            Request::GroupMsg { content, .. } if content.ends_with(" #2")
        ));
        assert_eq!(state.stats.actions[Action::SendMessage.index()], 2);
    }

    #[test]
    fn test_create_group_uses_displayname() {
        let mut scheduler = Scheduler::new(&config([0, 0, 0, 1])).unwrap();
        let mut state = state_with_group();
        let (outbox, mut rx) = Outbox::channel();

        scheduler.perform(Action::CreateGroup, &mut state, &outbox).unwrap();
        match rx.try_recv().unwrap() {
            Request::GroupCreate { name, .. } => assert_eq!(name, "Bot 1's room 1"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_select_group_picks_known_group() {
        let mut scheduler = Scheduler::new(&config([0, 0, 1, 0])).unwrap();
        let mut state = state_with_group();
        state.cache.insert_group(Group::new(9, 1, "other", false, vec![1]));
        let (outbox, _rx) = Outbox::channel();

        for _ in 0..20 {
            assert!(scheduler.perform(Action::SelectGroup, &mut state, &outbox).unwrap());
            assert!(matches!(state.current_group, Some(5) | Some(9)));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_paces_actions_and_stops_on_flag() {
        let mut scheduler = Scheduler::new(&BehaviorConfig {
            min_delay_ms: 1_000,
            max_delay_ms: 1_000,
            ..config([0, 1, 0, 0])
        })
        .unwrap();
        let state = ClientState::shared();
        let (outbox, mut rx) = Outbox::channel();
        let (running_tx, running_rx) = watch::channel(true);

        let task = {
            let state = state.clone();
            tokio::spawn(async move { scheduler.run(&state, &outbox, running_rx).await })
        };

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        running_tx.send(false).unwrap();
        task.await.unwrap().unwrap();

        let mut requests = 0;
        while let Ok(request) = rx.try_recv() {
            assert_eq!(request, Request::GetAllGroups);
            requests += 1;
        }
        assert_eq!(requests, 3);
        assert_eq!(state.lock().await.stats.actions, [0, 3, 0, 0]);
    }
}
