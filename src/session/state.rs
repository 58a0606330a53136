//! Link lifecycle states.
//!
//! ```text
//!  Disconnected ─▶ Connecting ─▶ Discovering ─▶ Ready ─▶ SecuringSession ─▶ Active
//!       ▲              │              │           │              │             │
//!       └──────────────┴──────────────┴───────────┴──────────────┴─────────────┘
//!                        failure / disconnect / link lost
//! ```

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum LinkState {
    #[default]
    Disconnected = 0,
    Connecting = 1,
    Discovering = 2,
    Ready = 3,
    SecuringSession = 4,
    Active = 5,
}

impl LinkState {
    /// Whether the GATT link is up and the BluFi characteristics are known.
    pub const fn has_channel(self) -> bool {
        matches!(self, Self::Ready | Self::SecuringSession | Self::Active)
    }

    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Legal edges of the lifecycle graph. Any state may fall back to
    /// `Disconnected`; otherwise only the next forward step is allowed.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (_, Self::Disconnected)
                | (Self::Disconnected, Self::Connecting)
                | (Self::Connecting, Self::Discovering)
                | (Self::Discovering, Self::Ready)
                | (Self::Ready, Self::SecuringSession)
                | (Self::SecuringSession, Self::Active)
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
