//! Generation stamps for in-flight requests.
//!
//! Responses are applied only while their ticket is current. Reads and
//! searches are latest-wins per kind; marker mutations share one session
//! epoch so concurrent creates all land. `teardown` retires every ticket.

/// Operation class of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    List,
    Create,
    Delete,
    Search,
    Geocode,
    Locate,
}

impl RequestKind {
    const ALL: [RequestKind; 6] = [
        RequestKind::List,
        RequestKind::Create,
        RequestKind::Delete,
        RequestKind::Search,
        RequestKind::Geocode,
        RequestKind::Locate,
    ];

    fn slot(self) -> usize {
        match self {
            RequestKind::List => 0,
            RequestKind::Create | RequestKind::Delete => 1,
            RequestKind::Search => 2,
            RequestKind::Geocode => 3,
            RequestKind::Locate => 4,
        }
    }

    /// Whether a newer request of the same kind supersedes older ones
    fn latest_wins(self) -> bool {
        !matches!(self, RequestKind::Create | RequestKind::Delete)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub kind: RequestKind,
    generation: u64,
}

#[derive(Debug, Default)]
pub struct RequestTickets {
    generations: [u64; 5],
}

impl RequestTickets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp a new request. Latest-wins kinds retire their older tickets.
    pub fn issue(&mut self, kind: RequestKind) -> Ticket {
        let slot = kind.slot();
        if kind.latest_wins() {
            self.generations[slot] += 1;
        }
        Ticket {
            kind,
            generation: self.generations[slot],
        }
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.generations[ticket.kind.slot()] == ticket.generation
    }

    /// Retire outstanding tickets of one kind
    pub fn invalidate(&mut self, kind: RequestKind) {
        self.generations[kind.slot()] += 1;
    }

    /// Retire every outstanding ticket
    pub fn teardown(&mut self) {
        for kind in RequestKind::ALL {
            // Create and Delete share a slot; bump it once
            if kind != RequestKind::Delete {
                self.invalidate(kind);
            }
        }
    }
}
