//! Balance synchronizer
//!
//! Bookkeeping for balance queries. Every query gets a ticket carrying the
//! owner and a monotonically increasing sequence number; a completed query
//! is applied only if its owner is still the session's address and no
//! later-sequenced query has already been applied. Network completion order
//! plays no part in the decision.

use crate::Result;
use crate::models::{TokenAmount, WalletAddress};
use serde::{Deserialize, Serialize};

/// Identity of one balance query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTicket {
    pub address: WalletAddress,
    pub seq: u64,
}

/// The single retained balance result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceReading {
    pub address: WalletAddress,
    /// `None` when the query failed
    pub amount: Option<TokenAmount>,
    /// Sequence number of the query that produced this reading
    pub queried_at: u64,
    /// Transient failure description, set only when `amount` is `None`
    pub error: Option<String>,
}

/// What happened to a completed query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    Applied,
    /// A later query was already applied, or the session was reset since
    Superseded,
    /// The owner is no longer the current address
    StaleAddress,
}

#[derive(Debug, Default)]
pub struct BalanceSynchronizer {
    next_seq: u64,
    /// Sequence numbers up to this value can no longer be applied
    applied_floor: u64,
    in_flight: Option<QueryTicket>,
    reading: Option<BalanceReading>,
}

impl BalanceSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch to a freshly current `address` and issue its first query.
    ///
    /// The previous reading is dropped and every earlier query is logically
    /// cancelled.
    pub fn retarget(&mut self, address: &WalletAddress) -> QueryTicket {
        self.reset();
        self.issue(address)
    }

    /// Periodic refresh; `None` when a query for `address` is already in flight
    pub fn poll(&mut self, address: &WalletAddress) -> Option<QueryTicket> {
        match &self.in_flight {
            Some(ticket) if &ticket.address == address => None,
            _ => Some(self.issue(address)),
        }
    }

    /// Forget the reading and supersede everything issued so far
    pub fn reset(&mut self) {
        self.reading = None;
        self.in_flight = None;
        self.applied_floor = self.next_seq;
    }

    fn issue(&mut self, address: &WalletAddress) -> QueryTicket {
        self.next_seq += 1;
        let ticket = QueryTicket {
            address: address.clone(),
            seq: self.next_seq,
        };
        self.in_flight = Some(ticket.clone());
        ticket
    }

    /// Record the result of `ticket`, applying it only if it is still current
    pub fn complete(
        &mut self,
        current: Option<&WalletAddress>,
        ticket: &QueryTicket,
        result: Result<TokenAmount>,
    ) -> SyncDecision {
        if self.in_flight.as_ref().is_some_and(|t| t.seq == ticket.seq) {
            self.in_flight = None;
        }

        if current != Some(&ticket.address) {
            return SyncDecision::StaleAddress;
        }
        if ticket.seq <= self.applied_floor {
            return SyncDecision::Superseded;
        }

        self.applied_floor = ticket.seq;
        self.reading = Some(match result {
            Ok(amount) => BalanceReading {
                address: ticket.address.clone(),
                amount: Some(amount),
                queried_at: ticket.seq,
                error: None,
            },
            Err(e) => BalanceReading {
                address: ticket.address.clone(),
                amount: None,
                queried_at: ticket.seq,
                error: Some(e.to_string()),
            },
        });
        SyncDecision::Applied
    }

    pub fn reading(&self) -> Option<&BalanceReading> {
        self.reading.as_ref()
    }

    pub fn in_flight(&self) -> Option<&QueryTicket> {
        self.in_flight.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn addr(seed: &str) -> WalletAddress {
        crate::models::test_address(seed)
    }

    fn amount(raw: u64) -> Result<TokenAmount> {
        Ok(TokenAmount::new(raw, 0))
    }

    #[test]
    fn test_sequence_is_monotonic() {
        let mut sync = BalanceSynchronizer::new();
        let a = sync.retarget(&addr("ABC"));
        sync.reset();
        let b = sync.retarget(&addr("ABC"));
        let c = sync.retarget(&addr("XYZ"));
        assert!(a.seq < b.seq && b.seq < c.seq);
    }

    #[test]
    fn test_success_applies() {
        let mut sync = BalanceSynchronizer::new();
        let abc = addr("ABC");
        let ticket = sync.retarget(&abc);
        assert_eq!(sync.in_flight(), Some(&ticket));

        assert_eq!(sync.complete(Some(&abc), &ticket, amount(5)), SyncDecision::Applied);
        let reading = sync.reading().unwrap();
        assert_eq!(reading.amount, Some(TokenAmount::new(5, 0)));
        assert_eq!(reading.queried_at, ticket.seq);
        assert!(sync.in_flight().is_none());
    }

    #[test]
    fn test_failure_keeps_address_with_unknown_amount() {
        let mut sync = BalanceSynchronizer::new();
        let abc = addr("ABC");
        let ticket = sync.retarget(&abc);

        let decision = sync.complete(Some(&abc), &ticket, Err(Error::rpc("503")));
        assert_eq!(decision, SyncDecision::Applied);
        let reading = sync.reading().unwrap();
        assert_eq!(reading.amount, None);
        assert_eq!(reading.error.as_deref(), Some("RPC error: 503"));
    }

    #[test]
    fn test_stale_address_is_discarded() {
        let mut sync = BalanceSynchronizer::new();
        let (abc, xyz) = (addr("ABC"), addr("XYZ"));

        let old = sync.retarget(&abc);
        let new = sync.retarget(&xyz);
        assert_eq!(sync.complete(Some(&xyz), &new, amount(9)), SyncDecision::Applied);

        // Late answer for the previous owner.
        assert_eq!(sync.complete(Some(&xyz), &old, amount(5)), SyncDecision::StaleAddress);
        assert_eq!(sync.reading().unwrap().amount, Some(TokenAmount::new(9, 0)));
        assert_eq!(sync.reading().unwrap().address, xyz);
    }

    #[test]
    fn test_highest_sequence_wins_regardless_of_arrival() {
        let mut sync = BalanceSynchronizer::new();
        let abc = addr("ABC");

        let first = sync.retarget(&abc);
        // Force overlapping queries for the same owner.
        sync.in_flight = None;
        let second = sync.poll(&abc).unwrap();
        sync.in_flight = None;
        let third = sync.poll(&abc).unwrap();

        assert_eq!(sync.complete(Some(&abc), &third, amount(3)), SyncDecision::Applied);
        assert_eq!(sync.complete(Some(&abc), &first, amount(1)), SyncDecision::Superseded);
        assert_eq!(sync.complete(Some(&abc), &second, amount(2)), SyncDecision::Superseded);
        assert_eq!(sync.reading().unwrap().amount, Some(TokenAmount::new(3, 0)));
        assert_eq!(sync.reading().unwrap().queried_at, third.seq);
    }

    #[test]
    fn test_poll_coalesces_while_in_flight() {
        let mut sync = BalanceSynchronizer::new();
        let abc = addr("ABC");

        let ticket = sync.retarget(&abc);
        assert!(sync.poll(&abc).is_none());
        assert!(sync.poll(&abc).is_none());

        sync.complete(Some(&abc), &ticket, amount(1));
        let next = sync.poll(&abc).unwrap();
        assert_eq!(next.seq, ticket.seq + 1);
    }

    #[test]
    fn test_reset_supersedes_same_owner_queries() {
        let mut sync = BalanceSynchronizer::new();
        let abc = addr("ABC");

        // Disconnect and reconnect to the same owner while a query is out.
        let before = sync.retarget(&abc);
        sync.reset();
        assert!(sync.reading().is_none());
        let after = sync.retarget(&abc);

        assert_eq!(sync.complete(Some(&abc), &before, amount(5)), SyncDecision::Superseded);
        assert!(sync.reading().is_none());
        // The fresh query is still tracked as in flight.
        assert_eq!(sync.in_flight(), Some(&after));
        assert_eq!(sync.complete(Some(&abc), &after, amount(6)), SyncDecision::Applied);
    }

    #[test]
    fn test_result_after_disconnect_is_discarded() {
        let mut sync = BalanceSynchronizer::new();
        let abc = addr("ABC");

        let ticket = sync.retarget(&abc);
        sync.reset();
        assert_eq!(sync.complete(None, &ticket, amount(5)), SyncDecision::StaleAddress);
        assert!(sync.reading().is_none());
    }
}
