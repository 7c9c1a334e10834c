//! Link state machine for the reconnecting monitor
//!
//! ```text
//!                 OpenSucceeded
//!   Disconnected ───────────────► Connected ◄──┐ ReadTimedOut
//!     ▲  │   ▲                       │  │     │ ReadReturnedData
//!     │  │   └────── DeviceFaulted ──┘  └─────┘
//!     └──┘ DeviceFaulted (open failed)
//!
//!   Disconnected | Connected ── CancelRequested ──► Stopped
//! ```
//!
//! The transition function is pure; the monitor performs the returned
//! [`Action`] and feeds the next event back in.

/// Connection state of the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No session open; the next step is an open attempt
    Disconnected,
    /// Session open; the next step is a read
    Connected,
    /// Cancelled by the user; terminal
    Stopped,
}

/// Something that happened at a suspension point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    OpenSucceeded,
    ReadTimedOut,
    ReadReturnedData,
    DeviceFaulted,
    CancelRequested,
}

/// Side effect the monitor performs for a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Print the connected notice
    AnnounceConnected,
    /// Write the received bytes to the console
    Emit,
    /// Close any session, print the disconnected notice, then wait out the backoff
    Backoff,
    /// Close any session and print the stopped notice
    AnnounceStopped,
    /// Nothing to do
    Idle,
}

impl LinkState {
    /// Apply an event, returning the next state and the action to perform.
    pub fn on(self, event: LinkEvent) -> (LinkState, Action) {
        use LinkEvent::*;
        use LinkState::*;

        match (self, event) {
            (Stopped, _) => (Stopped, Action::Idle),
            (_, CancelRequested) => (Stopped, Action::AnnounceStopped),

            (Disconnected, OpenSucceeded) => (Connected, Action::AnnounceConnected),
            (Disconnected, DeviceFaulted) => (Disconnected, Action::Backoff),

            (Connected, ReadTimedOut) => (Connected, Action::Idle),
            (Connected, ReadReturnedData) => (Connected, Action::Emit),
            (Connected, DeviceFaulted) => (Disconnected, Action::Backoff),

            // Reads cannot happen without a session, and an open session is never reopened
            (Disconnected, ReadTimedOut | ReadReturnedData) | (Connected, OpenSucceeded) => {
                (self, Action::Idle)
            }
        }
    }

    pub fn is_terminal(self) -> bool {
        self == LinkState::Stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_connects() {
        assert_eq!(
            LinkState::Disconnected.on(LinkEvent::OpenSucceeded),
            (LinkState::Connected, Action::AnnounceConnected)
        );
    }

    #[test]
    fn test_open_failure_stays_disconnected_and_backs_off() {
        assert_eq!(
            LinkState::Disconnected.on(LinkEvent::DeviceFaulted),
            (LinkState::Disconnected, Action::Backoff)
        );
    }

    #[test]
    fn test_steady_state() {
        assert_eq!(
            LinkState::Connected.on(LinkEvent::ReadTimedOut),
            (LinkState::Connected, Action::Idle)
        );
        assert_eq!(
            LinkState::Connected.on(LinkEvent::ReadReturnedData),
            (LinkState::Connected, Action::Emit)
        );
    }

    #[test]
    fn test_fault_disconnects() {
        assert_eq!(
            LinkState::Connected.on(LinkEvent::DeviceFaulted),
            (LinkState::Disconnected, Action::Backoff)
        );
    }

    #[test]
    fn test_cancel_stops_from_any_live_state() {
        for state in [LinkState::Disconnected, LinkState::Connected] {
            assert_eq!(
                state.on(LinkEvent::CancelRequested),
                (LinkState::Stopped, Action::AnnounceStopped)
            );
        }
    }

    #[test]
    fn test_stopped_is_terminal() {
        let events = [
            LinkEvent::OpenSucceeded,
            LinkEvent::ReadTimedOut,
            LinkEvent::ReadReturnedData,
            LinkEvent::DeviceFaulted,
            LinkEvent::CancelRequested,
        ];
        for event in events {
            assert_eq!(LinkState::Stopped.on(event), (LinkState::Stopped, Action::Idle));
        }
        assert!(LinkState::Stopped.is_terminal());
        assert!(!LinkState::Connected.is_terminal());
    }

    #[test]
    fn test_repeated_faults_always_return_to_connected() {
        let mut state = LinkState::Disconnected;
        for _ in 0..5 {
            let (next, action) = state.on(LinkEvent::OpenSucceeded);
            assert_eq!(action, Action::AnnounceConnected);
            let (next, action) = next.on(LinkEvent::DeviceFaulted);
            assert_eq!(action, Action::Backoff);
            state = next;
        }
        assert_eq!(state, LinkState::Disconnected);
    }
}
