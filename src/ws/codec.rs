//! Binary codec for the wire protocol
//!
//! Every frame is one type byte followed by a fixed or count-prefixed
//! payload. Integers and floats are big-endian, floats are IEEE-754 `f32`
//! and names carry a single length byte. Bytes past the end of a complete
//! message are ignored; some clients pad their frames.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::game::map::Wall;

use super::protocol::{
    BulletSnapshot, ClientMsg, FireRequest, InputState, MessageType, PlayerName, PlayerSnapshot,
    PlayerStart, PlayerSummary, ServerMsg,
};

const PLAYER_SNAPSHOT_LEN: usize = 4 + 4 * 4 + 1;
const BULLET_LEN: usize = 4 * 2 + 4 * 5;
const WALL_LEN: usize = 4 * 4;

/// Decoding failures. Everything except `UnknownMessageType` is the
/// malformed-message class: drop the frame, keep the connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("malformed message: empty frame")]
    Empty,

    #[error("malformed message: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("malformed message: name is not valid UTF-8")]
    InvalidUtf8,

    #[error("unknown message type 0x{0:02x}")]
    UnknownMessageType(u8),
}

impl CodecError {
    pub fn is_malformed(&self) -> bool {
        !matches!(self, CodecError::UnknownMessageType(_))
    }
}

/// Bounds-checked cursor over an inbound frame
struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn ensure(&self, needed: usize) -> Result<(), CodecError> {
        if self.buf.remaining() < needed {
            return Err(CodecError::Truncated {
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    fn message_type(&mut self) -> Result<MessageType, CodecError> {
        if self.buf.is_empty() {
            return Err(CodecError::Empty);
        }
        MessageType::try_from(self.buf.get_u8()).map_err(CodecError::UnknownMessageType)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    fn f32(&mut self) -> Result<f32, CodecError> {
        self.ensure(4)?;
        Ok(self.buf.get_f32())
    }

    /// Read an element count and check the fixed-size elements all fit
    fn count(&mut self, element_len: usize) -> Result<usize, CodecError> {
        let count = self.u32()? as usize;
        let needed = count.saturating_mul(element_len);
        self.ensure(needed)?;
        Ok(count)
    }

    fn name(&mut self) -> Result<PlayerName, CodecError> {
        let len = self.u8()? as usize;
        self.ensure(len)?;
        let (bytes, rest) = self.buf.split_at(len);
        self.buf = rest;
        std::str::from_utf8(bytes)
            .map(PlayerName::from)
            .map_err(|_| CodecError::InvalidUtf8)
    }
}

fn put_name(buf: &mut BytesMut, name: &PlayerName) {
    // PlayerName guarantees the length fits in a byte
    buf.put_u8(name.as_bytes().len() as u8);
    buf.put_slice(name.as_bytes());
}

impl ClientMsg {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(32);
        buf.put_u8(self.message_type() as u8);

        match self {
            ClientMsg::Join { name } => put_name(&mut buf, name),
            ClientMsg::PlayerInput(input) => {
                buf.put_f32(input.x);
                buf.put_f32(input.y);
                buf.put_f32(input.hull_rotation);
                buf.put_f32(input.turret_rotation);
            }
            ClientMsg::FireBullet(fire) => {
                buf.put_f32(fire.x);
                buf.put_f32(fire.y);
                buf.put_f32(fire.rotation);
                buf.put_f32(fire.vel_x);
                buf.put_f32(fire.vel_y);
            }
            ClientMsg::ReadyForRematch => {}
        }

        buf.freeze()
    }

    pub fn decode(frame: &[u8]) -> Result<Self, CodecError> {
        let mut r = Reader::new(frame);

        match r.message_type()? {
            MessageType::Join => Ok(ClientMsg::Join { name: r.name()? }),
            MessageType::PlayerInput => Ok(ClientMsg::PlayerInput(InputState {
                x: r.f32()?,
                y: r.f32()?,
                hull_rotation: r.f32()?,
                turret_rotation: r.f32()?,
            })),
            MessageType::FireBullet => Ok(ClientMsg::FireBullet(FireRequest {
                x: r.f32()?,
                y: r.f32()?,
                rotation: r.f32()?,
                vel_x: r.f32()?,
                vel_y: r.f32()?,
            })),
            MessageType::ReadyForRematch => Ok(ClientMsg::ReadyForRematch),
            other => Err(CodecError::UnknownMessageType(other as u8)),
        }
    }
}

fn put_bullet(buf: &mut BytesMut, bullet: &BulletSnapshot) {
    buf.put_u32(bullet.id);
    buf.put_u32(bullet.owner_id);
    buf.put_f32(bullet.x);
    buf.put_f32(bullet.y);
    buf.put_f32(bullet.rotation);
    buf.put_f32(bullet.vel_x);
    buf.put_f32(bullet.vel_y);
}

fn read_bullet(r: &mut Reader<'_>) -> Result<BulletSnapshot, CodecError> {
    Ok(BulletSnapshot {
        id: r.u32()?,
        owner_id: r.u32()?,
        x: r.f32()?,
        y: r.f32()?,
        rotation: r.f32()?,
        vel_x: r.f32()?,
        vel_y: r.f32()?,
    })
}

fn read_player_start(r: &mut Reader<'_>) -> Result<PlayerStart, CodecError> {
    Ok(PlayerStart {
        id: r.u32()?,
        x: r.f32()?,
        y: r.f32()?,
        hull_rotation: r.f32()?,
        turret_rotation: r.f32()?,
        name: r.name()?,
    })
}

fn read_player_summary(r: &mut Reader<'_>) -> Result<PlayerSummary, CodecError> {
    Ok(PlayerSummary {
        id: r.u32()?,
        kills: r.u8()?,
        deaths: r.u8()?,
        name: r.name()?,
    })
}

impl ServerMsg {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len_hint());
        buf.put_u8(self.message_type() as u8);

        match self {
            ServerMsg::JoinSuccess { player_id } => buf.put_u32(*player_id),
            ServerMsg::GameState { players } => {
                buf.put_u32(players.len() as u32);
                for p in players {
                    buf.put_u32(p.id);
                    buf.put_f32(p.x);
                    buf.put_f32(p.y);
                    buf.put_f32(p.hull_rotation);
                    buf.put_f32(p.turret_rotation);
                    buf.put_u8(p.health);
                }
            }
            ServerMsg::WaitingForPlayers { count } => buf.put_u8(*count),
            ServerMsg::GameStart { players } => {
                for p in players {
                    buf.put_u32(p.id);
                    buf.put_f32(p.x);
                    buf.put_f32(p.y);
                    buf.put_f32(p.hull_rotation);
                    buf.put_f32(p.turret_rotation);
                    put_name(&mut buf, &p.name);
                }
            }
            ServerMsg::BulletFired(bullet) => put_bullet(&mut buf, bullet),
            ServerMsg::PlayerHit { player_id, health } => {
                buf.put_u32(*player_id);
                buf.put_u8(*health);
            }
            ServerMsg::PlayerDied { player_id } => buf.put_u32(*player_id),
            ServerMsg::GameOver { winner_id, players } => {
                buf.put_u32(winner_id.unwrap_or(0));
                for p in players {
                    buf.put_u32(p.id);
                    buf.put_u8(p.kills);
                    buf.put_u8(p.deaths);
                    put_name(&mut buf, &p.name);
                }
            }
            ServerMsg::BulletDestroyed { bullet_id } => buf.put_u32(*bullet_id),
            ServerMsg::PlayerLeft { player_id } => buf.put_u32(*player_id),
            ServerMsg::WallsInfo {
                map_width,
                map_height,
                walls,
            } => {
                buf.put_u32(walls.len() as u32);
                buf.put_f32(*map_width);
                buf.put_f32(*map_height);
                for wall in walls {
                    buf.put_f32(wall.x);
                    buf.put_f32(wall.y);
                    buf.put_f32(wall.w);
                    buf.put_f32(wall.h);
                }
            }
            ServerMsg::BulletsState { bullets } => {
                buf.put_u32(bullets.len() as u32);
                for bullet in bullets {
                    put_bullet(&mut buf, bullet);
                }
            }
        }

        buf.freeze()
    }

    pub fn decode(frame: &[u8]) -> Result<Self, CodecError> {
        let mut r = Reader::new(frame);

        let msg = match r.message_type()? {
            MessageType::JoinSuccess => ServerMsg::JoinSuccess { player_id: r.u32()? },
            MessageType::GameState => {
                let count = r.count(PLAYER_SNAPSHOT_LEN)?;
                let mut players = Vec::with_capacity(count);
                for _ in 0..count {
                    players.push(PlayerSnapshot {
                        id: r.u32()?,
                        x: r.f32()?,
                        y: r.f32()?,
                        hull_rotation: r.f32()?,
                        turret_rotation: r.f32()?,
                        health: r.u8()?,
                    });
                }
                ServerMsg::GameState { players }
            }
            MessageType::WaitingForPlayers => ServerMsg::WaitingForPlayers { count: r.u8()? },
            MessageType::GameStart => {
                let first = read_player_start(&mut r)?;
                let second = read_player_start(&mut r)?;
                ServerMsg::GameStart {
                    players: [first, second],
                }
            }
            MessageType::BulletFired => ServerMsg::BulletFired(read_bullet(&mut r)?),
            MessageType::PlayerHit => ServerMsg::PlayerHit {
                player_id: r.u32()?,
                health: r.u8()?,
            },
            MessageType::PlayerDied => ServerMsg::PlayerDied { player_id: r.u32()? },
            MessageType::GameOver => {
                let winner_id = Some(r.u32()?).filter(|id| *id != 0);
                let first = read_player_summary(&mut r)?;
                let second = read_player_summary(&mut r)?;
                ServerMsg::GameOver {
                    winner_id,
                    players: [first, second],
                }
            }
            MessageType::BulletDestroyed => ServerMsg::BulletDestroyed { bullet_id: r.u32()? },
            MessageType::PlayerLeft => ServerMsg::PlayerLeft { player_id: r.u32()? },
            MessageType::WallsInfo => {
                let count = r.u32()? as usize;
                let map_width = r.f32()?;
                let map_height = r.f32()?;
                r.ensure(count.saturating_mul(WALL_LEN))?;
                let mut walls = Vec::with_capacity(count);
                for _ in 0..count {
                    walls.push(Wall::new(r.f32()?, r.f32()?, r.f32()?, r.f32()?));
                }
                ServerMsg::WallsInfo {
                    map_width,
                    map_height,
                    walls,
                }
            }
            MessageType::BulletsState => {
                let count = r.count(BULLET_LEN)?;
                let mut bullets = Vec::with_capacity(count);
                for _ in 0..count {
                    bullets.push(read_bullet(&mut r)?);
                }
                ServerMsg::BulletsState { bullets }
            }
            other => return Err(CodecError::UnknownMessageType(other as u8)),
        };

        Ok(msg)
    }

    fn encoded_len_hint(&self) -> usize {
        match self {
            ServerMsg::GameState { players } => 5 + players.len() * PLAYER_SNAPSHOT_LEN,
            ServerMsg::BulletsState { bullets } => 5 + bullets.len() * BULLET_LEN,
            ServerMsg::WallsInfo { walls, .. } => 13 + walls.len() * WALL_LEN,
            _ => 64,
        }
    }
}
