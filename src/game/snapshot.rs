//! Snapshot building

use crate::config::GameConfig;
use crate::ws::protocol::ServerMsg;

use super::room::Room;

/// Builds full-state messages for network transmission
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// All players of a room, in seat order
    pub fn players(room: &Room) -> ServerMsg {
        ServerMsg::GameState {
            players: room.players().iter().map(|p| p.snapshot()).collect(),
        }
    }

    /// All live bullets of a room
    pub fn bullets(room: &Room) -> ServerMsg {
        ServerMsg::BulletsState {
            bullets: room.bullets().iter().map(|b| b.snapshot()).collect(),
        }
    }

    /// Static layout, sent once when a room forms
    pub fn walls(config: &GameConfig) -> ServerMsg {
        ServerMsg::WallsInfo {
            map_width: config.map.width,
            map_height: config.map.height,
            walls: config.map.walls.clone(),
        }
    }
}

/// Snapshot volume for the periodic debug summary
#[derive(Debug, Default, Clone)]
pub struct SnapshotStats {
    pub total_snapshots: u64,
    pub total_bytes: u64,
    pub avg_bullets_per_snapshot: f32,
}

impl SnapshotStats {
    pub fn record(&mut self, bullet_count: usize, bytes: usize) {
        self.total_snapshots += 1;
        self.total_bytes += bytes as u64;

        // Running average
        let n = self.total_snapshots as f32;
        self.avg_bullets_per_snapshot =
            self.avg_bullets_per_snapshot * ((n - 1.0) / n) + (bullet_count as f32 / n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walls_snapshot_carries_full_layout() {
        let config = GameConfig::default();
        match SnapshotBuilder::walls(&config) {
            ServerMsg::WallsInfo {
                map_width,
                map_height,
                walls,
            } => {
                assert_eq!((map_width, map_height), (1800.0, 800.0));
                assert_eq!(walls, config.map.walls);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn stats_track_running_average() {
        let mut stats = SnapshotStats::default();
        stats.record(2, 100);
        stats.record(4, 300);
        assert_eq!(stats.total_snapshots, 2);
        assert_eq!(stats.total_bytes, 400);
        assert!((stats.avg_bullets_per_snapshot - 3.0).abs() < 1e-5);
    }
}
