//! Match lifecycle: scores, the game-over latch, and the client-side
//! pre-match countdown.
//!
//! The server owns the score table and decides game over; clients mirror
//! both from broadcasts. The countdown is cosmetic on multiplayer clients
//! (the server's MatchBegin is what actually opens gameplay) and
//! authoritative only in single-player.

use crate::events::{CountdownStep, EventBus, GameEvent};
use bevy_ecs::system::Resource;
use crazycanvas_core::team::MAX_NUM_TEAMS;
use crazycanvas_core::tunables::{
    COUNTDOWN_HIDE_DELAY, DEFAULT_MAX_SCORE, MATCH_BEGIN_COUNTDOWN_TIME,
};
use crazycanvas_core::{GameMode, TeamIndex};
use crazycanvas_ecs::JobWorld;
use crazycanvas_net::{ServerPacket, TeamScored};
use tracing::info;

/// Authoritative match state on the server; a mirrored copy on clients.
#[derive(Resource, Debug, Clone)]
pub struct MatchInfo {
    /// Active game mode.
    pub mode: GameMode,
    /// Score that ends the match.
    pub max_score: u32,
    /// Per-team score table.
    pub scores: [u32; MAX_NUM_TEAMS],
    /// Whether gameplay is live (post-countdown).
    pub has_begun: bool,
    /// Winning team once the match has ended. Latched until the host
    /// resets; scoring is refused while set.
    pub game_over: Option<TeamIndex>,
}

impl MatchInfo {
    /// A fresh match in `mode` playing to `max_score`.
    pub fn new(mode: GameMode, max_score: u32) -> Self {
        Self {
            mode,
            max_score,
            scores: [0; MAX_NUM_TEAMS],
            has_begun: false,
            game_over: None,
        }
    }

    /// Score of one team.
    pub fn score(&self, team: TeamIndex) -> u32 {
        self.scores
            .get(team.0 as usize)
            .copied()
            .unwrap_or_default()
    }

    /// Zero the score table and clear the game-over latch.
    pub fn reset_scores(&mut self) {
        self.scores = [0; MAX_NUM_TEAMS];
        self.has_begun = false;
        self.game_over = None;
    }
}

impl Default for MatchInfo {
    fn default() -> Self {
        Self::new(GameMode::None, DEFAULT_MAX_SCORE)
    }
}

/// Server-to-everyone packets accumulated during a tick and flushed by the
/// host's network layer.
#[derive(Resource, Default)]
pub struct Broadcasts(Vec<ServerPacket>);

impl Broadcasts {
    /// Queue one broadcast.
    pub fn push(&mut self, packet: ServerPacket) {
        self.0.push(packet);
    }

    /// Take everything queued so far.
    pub fn take(&mut self) -> Vec<ServerPacket> {
        std::mem::take(&mut self.0)
    }

    /// Queued packets, for inspection.
    pub fn pending(&self) -> &[ServerPacket] {
        &self.0
    }
}

/// Credit a delivery to `scoring_team`: bump the score, broadcast it, and
/// end the match when the limit is reached. Runs inside the delivery job.
pub fn on_flag_delivered(w: &mut JobWorld<'_, '_>, scoring_team: TeamIndex) {
    let (new_score, over) = {
        let mut match_info = w.resource_mut::<MatchInfo>();
        let idx = scoring_team.0 as usize;
        if idx >= MAX_NUM_TEAMS || match_info.game_over.is_some() {
            return;
        }
        match_info.scores[idx] += 1;
        let new_score = match_info.scores[idx];
        let over = new_score >= match_info.max_score;
        if over {
            match_info.game_over = Some(scoring_team);
        }
        (new_score, over)
    };

    {
        let mut broadcasts = w.resource_mut::<Broadcasts>();
        broadcasts.push(ServerPacket::TeamScored(TeamScored {
            team: scoring_team,
            new_score,
        }));
        if over {
            broadcasts.push(ServerPacket::GameOver {
                winning_team: scoring_team,
            });
        }
    }

    if over {
        info!(team = scoring_team.0, score = new_score, "match over");
        w.resource_mut::<EventBus>().publish(GameEvent::GameOver {
            winning_team: scoring_team,
        });
    }
}

/// Client-side pre-match countdown.
///
/// Emits `Seconds(5)` down through `Seconds(0)` as whole-second boundaries
/// are crossed, then a single `Hide` after a display delay. Each step is
/// emitted exactly once regardless of frame timing.
#[derive(Resource, Debug, Clone, Default)]
pub struct ClientCountdown {
    running: bool,
    timer: f32,
    hide_timer: f32,
    begun: bool,
}

impl ClientCountdown {
    /// Begin the countdown; emits the top step immediately.
    pub fn start(&mut self, events: &mut EventBus) {
        self.running = true;
        self.begun = false;
        self.timer = MATCH_BEGIN_COUNTDOWN_TIME;
        self.hide_timer = COUNTDOWN_HIDE_DELAY;
        events.publish(GameEvent::MatchCountdown {
            step: CountdownStep::Seconds(MATCH_BEGIN_COUNTDOWN_TIME as u8),
        });
    }

    /// Advance the countdown by one frame.
    pub fn tick(&mut self, dt: f32, events: &mut EventBus) {
        if !self.running {
            return;
        }
        if self.timer > 0.0 {
            let before = self.timer;
            self.timer -= dt;
            for second in (0..MATCH_BEGIN_COUNTDOWN_TIME as i32).rev() {
                let boundary = second as f32;
                if before > boundary && self.timer <= boundary {
                    events.publish(GameEvent::MatchCountdown {
                        step: CountdownStep::Seconds(second as u8),
                    });
                }
            }
            if self.timer <= 0.0 {
                self.begun = true;
            }
            return;
        }
        self.hide_timer -= dt;
        if self.hide_timer <= 0.0 {
            events.publish(GameEvent::MatchCountdown {
                step: CountdownStep::Hide,
            });
            self.running = false;
        }
    }

    /// Whether the local countdown has elapsed. Cosmetic on multiplayer
    /// clients; gates gameplay only in single-player.
    pub fn begun(&self) -> bool {
        self.begun
    }

    /// Whether a countdown is running or waiting on its hide delay.
    pub fn running(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_ecs::world::World;
    use crazycanvas_ecs::{drain_jobs, Job, JobQueue};
    use proptest::prelude::*;

    fn countdown_steps(dt: f32) -> Vec<CountdownStep> {
        let mut events = EventBus::new();
        let mut countdown = ClientCountdown::default();
        countdown.start(&mut events);
        let mut elapsed = 0.0;
        while countdown.running() && elapsed < 60.0 {
            countdown.tick(dt, &mut events);
            elapsed += dt;
        }
        events
            .drain_log()
            .into_iter()
            .filter_map(|e| match e {
                GameEvent::MatchCountdown { step } => Some(step),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn countdown_emits_each_step_once_in_order() {
        let steps = countdown_steps(1.0 / 60.0);
        assert_eq!(
            steps,
            vec![
                CountdownStep::Seconds(5),
                CountdownStep::Seconds(4),
                CountdownStep::Seconds(3),
                CountdownStep::Seconds(2),
                CountdownStep::Seconds(1),
                CountdownStep::Seconds(0),
                CountdownStep::Hide,
            ]
        );
    }

    #[test]
    fn countdown_survives_a_long_frame_hitch() {
        // A 2.5 second hitch must not skip any step.
        let steps = countdown_steps(2.5);
        let seconds: Vec<_> = steps
            .iter()
            .filter_map(|s| match s {
                CountdownStep::Seconds(n) => Some(*n),
                CountdownStep::Hide => None,
            })
            .collect();
        assert_eq!(seconds, vec![5, 4, 3, 2, 1, 0]);
        assert_eq!(steps.last(), Some(&CountdownStep::Hide));
    }

    fn scoring_world(max_score: u32) -> World {
        let mut world = World::default();
        world.insert_resource(JobQueue::default());
        world.insert_resource(EventBus::new());
        world.insert_resource(Broadcasts::default());
        world.insert_resource(MatchInfo::new(GameMode::CtfCommonFlag, max_score));
        world
    }

    fn deliver(world: &mut World, team: TeamIndex) {
        let job = Job::build().run(move |w| on_flag_delivered(w, team));
        world.resource_mut::<JobQueue>().schedule_asap(job);
        drain_jobs(world);
    }

    #[test]
    fn scoring_broadcasts_and_ends_exactly_at_max_score() {
        let mut world = scoring_world(2);
        let blue = TeamIndex(0);

        deliver(&mut world, blue);
        assert_eq!(world.resource::<MatchInfo>().score(blue), 1);
        assert!(world.resource::<MatchInfo>().game_over.is_none());

        deliver(&mut world, blue);
        let info = world.resource::<MatchInfo>();
        assert_eq!(info.score(blue), 2);
        assert_eq!(info.game_over, Some(blue));

        let packets = world.resource_mut::<Broadcasts>().take();
        assert_eq!(
            packets,
            vec![
                ServerPacket::TeamScored(TeamScored {
                    team: blue,
                    new_score: 1
                }),
                ServerPacket::TeamScored(TeamScored {
                    team: blue,
                    new_score: 2
                }),
                ServerPacket::GameOver { winning_team: blue },
            ]
        );
        let events = world.resource_mut::<EventBus>().drain_log();
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, GameEvent::GameOver { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn scoring_is_refused_after_game_over() {
        let mut world = scoring_world(1);
        let blue = TeamIndex(0);
        let red = TeamIndex(1);

        deliver(&mut world, blue);
        deliver(&mut world, red);

        let info = world.resource::<MatchInfo>();
        assert_eq!(info.game_over, Some(blue));
        assert_eq!(info.score(red), 0);
    }

    #[test]
    fn reset_clears_scores_and_latch() {
        let mut world = scoring_world(1);
        deliver(&mut world, TeamIndex(0));

        let mut info = world.resource_mut::<MatchInfo>();
        info.reset_scores();
        assert_eq!(info.scores, [0; MAX_NUM_TEAMS]);
        assert!(info.game_over.is_none());
        assert!(!info.has_begun);
    }

    proptest! {
        // Whatever the frame timing, the countdown emits 5..=0 exactly once
        // each, strictly descending, with Hide last.
        #[test]
        fn countdown_steps_are_complete_for_any_frame_time(dt in 0.001f32..3.0) {
            let steps = countdown_steps(dt);
            let seconds: Vec<_> = steps
                .iter()
                .filter_map(|s| match s {
                    CountdownStep::Seconds(n) => Some(*n),
                    CountdownStep::Hide => None,
                })
                .collect();
            prop_assert_eq!(seconds, vec![5, 4, 3, 2, 1, 0]);
            prop_assert_eq!(steps.last(), Some(&CountdownStep::Hide));
        }
    }
}
