use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the two colors. Each is owned by exactly one participant per match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::White => "white",
            Side::Black => "black",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<shakmaty::Color> for Side {
    fn from(color: shakmaty::Color) -> Self {
        match color {
            shakmaty::Color::White => Side::White,
            shakmaty::Color::Black => Side::Black,
        }
    }
}

impl From<Side> for shakmaty::Color {
    fn from(side: Side) -> Self {
        match side {
            Side::White => shakmaty::Color::White,
            Side::Black => shakmaty::Color::Black,
        }
    }
}

/// Server-owned count of accepted moves. Parity decides the side to move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnCounter(u32);

impl TurnCounter {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// White on even counts, Black on odd.
    pub fn side_to_move(self) -> Side {
        if self.0 % 2 == 0 {
            Side::White
        } else {
            Side::Black
        }
    }

    /// Wraps at `u32::MAX`; parity still alternates across the wrap.
    pub fn advance(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }
}

/// Terminal result of a match. Wire code is the variant's index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchOutcome {
    #[default]
    None,
    WhiteWinsByCheckmate,
    BlackWinsByCheckmate,
    DrawByStalemate,
    WhiteResigned,
    BlackResigned,
    ParticipantDisconnected,
}

impl MatchOutcome {
    const ALL: [MatchOutcome; 7] = [
        MatchOutcome::None,
        MatchOutcome::WhiteWinsByCheckmate,
        MatchOutcome::BlackWinsByCheckmate,
        MatchOutcome::DrawByStalemate,
        MatchOutcome::WhiteResigned,
        MatchOutcome::BlackResigned,
        MatchOutcome::ParticipantDisconnected,
    ];

    pub fn code(self) -> u8 {
        match self {
            MatchOutcome::None => 0,
            MatchOutcome::WhiteWinsByCheckmate => 1,
            MatchOutcome::BlackWinsByCheckmate => 2,
            MatchOutcome::DrawByStalemate => 3,
            MatchOutcome::WhiteResigned => 4,
            MatchOutcome::BlackResigned => 5,
            MatchOutcome::ParticipantDisconnected => 6,
        }
    }

    pub fn from_code(code: u8) -> Option<MatchOutcome> {
        Self::ALL.get(usize::from(code)).copied()
    }

    pub fn is_terminal(self) -> bool {
        self != MatchOutcome::None
    }

    /// Checkmate outcome crediting `winner`.
    pub fn checkmate_by(winner: Side) -> MatchOutcome {
        match winner {
            Side::White => MatchOutcome::WhiteWinsByCheckmate,
            Side::Black => MatchOutcome::BlackWinsByCheckmate,
        }
    }

    /// Resignation outcome for the side that gave up.
    pub fn resigned_by(resigner: Side) -> MatchOutcome {
        match resigner {
            Side::White => MatchOutcome::WhiteResigned,
            Side::Black => MatchOutcome::BlackResigned,
        }
    }

    /// The side credited with the win, if any.
    pub fn winner(self) -> Option<Side> {
        match self {
            MatchOutcome::WhiteWinsByCheckmate | MatchOutcome::BlackResigned => Some(Side::White),
            MatchOutcome::BlackWinsByCheckmate | MatchOutcome::WhiteResigned => Some(Side::Black),
            _ => None,
        }
    }

    /// Fixed result text shown to players.
    pub fn message(self) -> &'static str {
        match self {
            MatchOutcome::None => "",
            MatchOutcome::WhiteWinsByCheckmate => "White wins by checkmate!",
            MatchOutcome::BlackWinsByCheckmate => "Black wins by checkmate!",
            MatchOutcome::DrawByStalemate => "Game ends in a draw by stalemate.",
            MatchOutcome::WhiteResigned => "White resigned. Black wins!",
            MatchOutcome::BlackResigned => "Black resigned. White wins!",
            MatchOutcome::ParticipantDisconnected => "Game ended - player disconnected.",
        }
    }
}
