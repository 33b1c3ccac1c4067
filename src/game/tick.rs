//! One simulation step of a room

use tracing::{debug, info, trace};

use crate::config::GameConfig;
use crate::ws::protocol::ServerMsg;

use super::combat::{BulletStep, HitResult};
use super::room::Room;
use super::snapshot::SnapshotBuilder;
use super::{GameError, RoomId};

/// Advance a room by one tick at server time `now` (ms).
///
/// Returns the messages to broadcast, in order: bullet and hit events,
/// then the game over summary if the match ended, then the player and
/// bullet snapshots. Rooms already in `GameOver` produce nothing.
///
/// A hit naming a player the room does not hold is an
/// `InvariantViolation`; the room should be torn down.
pub fn step_room(
    room: &mut Room,
    now: u64,
    config: &GameConfig,
) -> Result<Vec<ServerMsg>, GameError> {
    if room.is_game_over() {
        return Ok(Vec::new());
    }

    room.ticks += 1;
    let dt = config.tick_delta();
    let walls = &config.map.walls;
    let room_id = room.id();

    let mut events = Vec::new();
    let mut deaths = 0usize;
    let mut failure: Option<GameError> = None;
    let mut bullets = std::mem::take(&mut room.bullets);

    bullets.retain_mut(|bullet| {
        if failure.is_some() {
            return true;
        }

        if bullet.step(dt, walls, config) == BulletStep::Exhausted {
            trace!(room_id, bullet_id = bullet.id, "Bullet used up its bounces");
            events.push(ServerMsg::BulletDestroyed {
                bullet_id: bullet.id,
            });
            return false;
        }

        if bullet.is_expired(now, config.bullet_lifetime_ms) {
            trace!(room_id, bullet_id = bullet.id, age_ms = bullet.age(now), "Bullet expired");
            events.push(ServerMsg::BulletDestroyed {
                bullet_id: bullet.id,
            });
            return false;
        }

        for target_id in room.player_ids() {
            let Some(target) = room.player(target_id) else {
                continue;
            };
            if !target.is_alive() || !bullet.can_hit(target_id, now) {
                continue;
            }
            if !bullet.check_hit(target, config) {
                continue;
            }

            let applied = room
                .hit_player(target_id)
                .map_err(unseated(room_id))
                .and_then(|new_health| {
                    let hit = HitResult {
                        bullet_id: bullet.id,
                        shooter_id: bullet.owner_id,
                        target_id,
                        new_health,
                        target_killed: new_health == 0,
                    };
                    apply_hit(room, hit, &mut events).map(|()| hit)
                });
            return match applied {
                Ok(hit) => {
                    if hit.target_killed {
                        deaths += 1;
                    }
                    false
                }
                Err(e) => {
                    failure = Some(e);
                    true
                }
            };
        }

        true
    });

    room.bullets = bullets;
    if let Some(e) = failure {
        return Err(e);
    }

    if deaths > 0 {
        if let Some(result) = room.check_game_over() {
            info!(room_id, winner = ?result.winner, "Game over");
            events.push(room.game_over_msg(result));
        }
    }

    events.push(SnapshotBuilder::players(room));
    events.push(SnapshotBuilder::bullets(room));

    if room.ticks % 90 == 0 {
        debug!(
            room_id,
            ticks = room.ticks,
            bullets = room.bullets().len(),
            "Room summary"
        );
    }

    Ok(events)
}

/// Ids taken from the room or its bullets must resolve inside it
fn unseated(room_id: RoomId) -> impl Fn(GameError) -> GameError {
    move |e| GameError::InvariantViolation {
        room_id,
        reason: e.to_string(),
    }
}

fn apply_hit(
    room: &mut Room,
    hit: HitResult,
    events: &mut Vec<ServerMsg>,
) -> Result<(), GameError> {
    let room_id = room.id();
    info!(
        room_id,
        bullet_id = hit.bullet_id,
        shooter_id = hit.shooter_id,
        target_id = hit.target_id,
        health = hit.new_health,
        "Player hit"
    );

    events.push(ServerMsg::BulletDestroyed {
        bullet_id: hit.bullet_id,
    });
    events.push(ServerMsg::PlayerHit {
        player_id: hit.target_id,
        health: hit.new_health,
    });

    if hit.target_killed {
        // The shooter is credited even for a self-kill
        room.record_kill(hit.shooter_id).map_err(unseated(room_id))?;
        room.record_death(hit.target_id).map_err(unseated(room_id))?;
        info!(room_id, player_id = hit.target_id, "Player died");
        events.push(ServerMsg::PlayerDied {
            player_id: hit.target_id,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::combat::Bullet;
    use crate::game::room::Seat;
    use crate::ws::connection::ClientConnection;
    use crate::ws::protocol::{FireRequest, InputState, MessageType};

    fn room(config: &GameConfig) -> Room {
        let seat = |player_id, name: &str| Seat {
            player_id,
            name: name.into(),
            connection: ClientConnection::channel(4).0,
        };
        Room::new(1, [seat(1, "P1"), seat(2, "P2")], config).unwrap()
    }

    fn fire(x: f32, y: f32, vel_x: f32, vel_y: f32) -> FireRequest {
        FireRequest {
            x,
            y,
            rotation: vel_y.atan2(vel_x),
            vel_x,
            vel_y,
        }
    }

    fn kinds(events: &[ServerMsg]) -> Vec<MessageType> {
        events.iter().map(|m| m.message_type()).collect()
    }

    #[test]
    fn quiet_tick_only_sends_snapshots() {
        let config = GameConfig::default();
        let mut room = room(&config);
        let events = step_room(&mut room, 0, &config).unwrap();
        assert_eq!(
            kinds(&events),
            vec![MessageType::GameState, MessageType::BulletsState]
        );
    }

    #[test]
    fn bullet_inside_target_hits_and_is_removed() {
        let config = GameConfig::default();
        let mut room = room(&config);
        // Just left of P2, moving slowly toward it
        room.add_bullet(Bullet::new(7, 1, fire(1590.0, 400.0, 0.1, 0.0), 0, &config));

        let events = step_room(&mut room, 33, &config).unwrap();

        assert_eq!(
            events[..2],
            [
                ServerMsg::BulletDestroyed { bullet_id: 7 },
                ServerMsg::PlayerHit {
                    player_id: 2,
                    health: 2
                },
            ]
        );
        assert!(room.bullets().is_empty());
        assert_eq!(room.player(2).unwrap().health, 2);
    }

    #[test]
    fn owner_is_safe_during_grace_period() {
        let config = GameConfig::default();
        let mut room = room(&config);
        room.add_bullet(Bullet::new(1, 1, fire(200.0, 400.0, 0.0, 0.0), 0, &config));

        step_room(&mut room, 33, &config).unwrap();
        assert_eq!(room.player(1).unwrap().health, 3);
        assert_eq!(room.bullets().len(), 1);

        let events = step_room(&mut room, 500, &config).unwrap();
        assert_eq!(room.player(1).unwrap().health, 2);
        assert!(events.contains(&ServerMsg::PlayerHit {
            player_id: 1,
            health: 2
        }));
    }

    #[test]
    fn expired_bullet_is_destroyed() {
        let config = GameConfig::default();
        let mut room = room(&config);
        room.add_bullet(Bullet::new(3, 1, fire(900.0, 250.0, 0.0, 0.0), 0, &config));

        let events = step_room(&mut room, 5_000, &config).unwrap();
        assert_eq!(room.bullets().len(), 1);
        assert!(!events.contains(&ServerMsg::BulletDestroyed { bullet_id: 3 }));

        let events = step_room(&mut room, 5_001, &config).unwrap();
        assert_eq!(events[0], ServerMsg::BulletDestroyed { bullet_id: 3 });
        assert!(room.bullets().is_empty());
    }

    #[test]
    fn lethal_hit_ends_game_before_snapshots() {
        let config = GameConfig::default();
        let mut room = room(&config);
        room.hit_player(2).unwrap();
        room.hit_player(2).unwrap();
        room.add_bullet(Bullet::new(9, 1, fire(1590.0, 400.0, 0.1, 0.0), 0, &config));

        let events = step_room(&mut room, 33, &config).unwrap();

        assert_eq!(
            kinds(&events),
            vec![
                MessageType::BulletDestroyed,
                MessageType::PlayerHit,
                MessageType::PlayerDied,
                MessageType::GameOver,
                MessageType::GameState,
                MessageType::BulletsState,
            ]
        );
        match &events[3] {
            ServerMsg::GameOver { winner_id, players } => {
                assert_eq!(*winner_id, Some(1));
                assert_eq!((players[0].kills, players[1].deaths), (1, 1));
            }
            other => panic!("unexpected {other:?}"),
        }

        // Frozen once over
        assert!(step_room(&mut room, 66, &config).unwrap().is_empty());
    }

    #[test]
    fn simultaneous_kills_have_no_winner() {
        let config = GameConfig::default();
        let mut room = room(&config);
        for id in [1, 2] {
            room.hit_player(id).unwrap();
            room.hit_player(id).unwrap();
        }
        room.add_bullet(Bullet::new(1, 2, fire(210.0, 400.0, 0.0, 0.0), 0, &config));
        room.add_bullet(Bullet::new(2, 1, fire(1590.0, 400.0, 0.0, 0.0), 0, &config));

        let events = step_room(&mut room, 33, &config).unwrap();
        let game_over: Vec<_> = events
            .iter()
            .filter_map(|m| match m {
                ServerMsg::GameOver { winner_id, .. } => Some(*winner_id),
                _ => None,
            })
            .collect();
        assert_eq!(game_over, vec![None]);
    }

    #[test]
    fn dead_players_are_not_hit_again() {
        let config = GameConfig::default();
        let mut room = room(&config);
        for _ in 0..3 {
            room.hit_player(2).unwrap();
        }
        room.add_bullet(Bullet::new(4, 1, fire(1590.0, 400.0, 0.0, 0.0), 0, &config));

        step_room(&mut room, 33, &config).unwrap();
        assert_eq!(room.bullets().len(), 1);
    }

    #[test]
    fn snapshot_reflects_moved_bullet_and_player_pose() {
        let config = GameConfig::default();
        let mut room = room(&config);
        room.update_player_position(
            1,
            &InputState {
                x: 300.0,
                y: 300.0,
                hull_rotation: 0.0,
                turret_rotation: 0.25,
            },
            &config.map,
        )
        .unwrap();
        room.add_bullet(Bullet::new(5, 1, fire(500.0, 300.0, 10.0, 0.0), 0, &config));

        let events = step_room(&mut room, 33, &config).unwrap();
        let ServerMsg::GameState { players } = &events[0] else {
            panic!("expected game state first");
        };
        assert_eq!(players[0].turret_rotation, 0.25);
        let ServerMsg::BulletsState { bullets } = &events[1] else {
            panic!("expected bullets state second");
        };
        assert!((bullets[0].x - 520.0).abs() < 1e-3);
    }

    #[test]
    fn kill_by_unseated_shooter_is_an_invariant_violation() {
        let config = GameConfig::default();
        let mut room = room(&config);
        room.hit_player(2).unwrap();
        room.hit_player(2).unwrap();
        room.add_bullet(Bullet::new(6, 99, fire(1590.0, 400.0, 0.1, 0.0), 0, &config));

        let err = step_room(&mut room, 33, &config).unwrap_err();
        assert!(matches!(err, GameError::InvariantViolation { room_id: 1, .. }));
        assert!(!room.is_game_over());
    }
}
