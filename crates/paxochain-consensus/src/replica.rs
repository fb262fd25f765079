//! The per-replica acceptor + proposer/leader state machine.

use std::collections::VecDeque;

use paxochain_storage::{Blockchain, Dictionary};
use paxochain_types::{Ballot, Block, Message, OpType, Operation, ProcessId};
use paxochain_primitives::Roster;
use tracing::{debug, info};

use crate::error::ConsensusResult;
use crate::outbound::{Outbound, Recipient};

const FULFILL_PUT_MESSAGE: &str = "It will be done, my lord.";

struct QueuedRequest {
    client: u32,
    operation: Operation,
}

/// One replica's full Paxos + log state.
///
/// Drive it by calling [`Replica::dispatch`] for each inbound message, then
/// [`Replica::take_messages`] to collect what to send.
pub struct Replica {
    self_id: u32,
    roster: Roster,
    chain: Blockchain,
    dict: Dictionary,

    // Acceptor state
    ballot: Ballot,
    accept_num: Ballot,
    accept_val: Option<Block>,
    leader_id: Option<u32>,

    // Proposer/leader state
    value: Option<Block>,
    highest_promised_accept_num: Ballot,
    promise_responses: u32,
    promise_fired: bool,
    accept_responses: u32,
    accept_fired: bool,
    queue: VecDeque<QueuedRequest>,

    pending: Vec<Outbound>,
}

impl Replica {
    /// Build a replica backed by `chain` (already restored, if persistent).
    pub fn new(self_id: u32, roster: Roster, chain: Blockchain) -> Self {
        let mut dict = Dictionary::new();
        dict.update(&chain.blocks(), chain.depth());
        Replica {
            self_id,
            roster,
            chain,
            dict,
            ballot: Ballot::ZERO,
            accept_num: Ballot::ZERO,
            accept_val: None,
            leader_id: None,
            value: None,
            highest_promised_accept_num: Ballot::ZERO,
            promise_responses: 0,
            promise_fired: false,
            accept_responses: 0,
            accept_fired: false,
            queue: VecDeque::new(),
            pending: Vec::new(),
        }
    }

    /// This replica's own pid.
    pub fn self_id(&self) -> u32 {
        self.self_id
    }

    /// The replica believed to be leader, if any has been established.
    pub fn leader_id(&self) -> Option<u32> {
        self.leader_id
    }

    /// `true` if this replica currently believes itself to be the leader.
    pub fn is_leader(&self) -> bool {
        self.leader_id == Some(self.self_id)
    }

    /// Current log depth.
    pub fn depth(&self) -> u64 {
        self.chain.depth()
    }

    /// Look up a key in the dictionary projection.
    pub fn get(&self, key: &str) -> String {
        self.dict.get(key)
    }

    /// Read-only access to the log, for diagnostics (`printBlockchain`).
    pub fn blocks(&self) -> Vec<Block> {
        self.chain.blocks()
    }

    /// Number of requests currently queued awaiting agreement.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Drain and return every message queued for delivery since the last
    /// call.
    pub fn take_messages(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.pending)
    }

    /// Handle one inbound message from `sender`.
    pub fn dispatch(&mut self, sender: ProcessId, msg: Message) -> ConsensusResult<()> {
        debug!(kind = msg.kind_str(), from = sender.pid, "dispatching message");
        match msg {
            Message::ClientRequest {
                operation,
                client,
                force_leader,
            } => self.handle_client_request(operation, client, force_leader),
            Message::PrepareRequest { ballot, depth } => {
                self.handle_prepare_request(sender.pid, ballot, depth)
            }
            Message::Promise {
                ballot,
                accept_num,
                accept_val,
                depth,
            } => self.handle_promise(sender.pid, ballot, accept_num, accept_val, depth),
            Message::AcceptRequest { ballot, value, depth } => {
                self.handle_accept_request(sender.pid, ballot, value, depth)
            }
            Message::Accept { ballot, value, depth } => {
                self.handle_accept(sender.pid, ballot, value, depth)
            }
            Message::Decide { value, .. } => self.decide(value),
            Message::RecoveryData { depth, block } => self.handle_recovery_data(depth, block),
            Message::ClientResponse { .. } => Ok(()),
            Message::Quit => Ok(()),
            Message::Test { message } => {
                info!(%message, "test message received");
                Ok(())
            }
        }
    }

    fn handle_client_request(
        &mut self,
        operation: Operation,
        client: u32,
        force_leader: bool,
    ) -> ConsensusResult<()> {
        if self.is_leader() {
            self.queue.push_back(QueuedRequest { client, operation: operation.clone() });
            if self.queue.len() == 1 {
                self.send_accept_request(operation)?;
            }
        } else if self.leader_id.is_none() || force_leader {
            self.queue.push_back(QueuedRequest { client, operation: operation.clone() });
            self.send_prepare_request(operation)?;
        } else {
            let leader = self.leader_id.unwrap();
            self.pending.push(Outbound::new(
                Recipient::Server(leader),
                Message::ClientRequest { operation, client, force_leader },
            ));
        }
        Ok(())
    }

    fn send_prepare_request(&mut self, operation: Operation) -> ConsensusResult<()> {
        self.reset_round();
        self.ballot = self.ballot.bumped(self.chain.depth(), self.self_id);
        let block = self.chain.generate_next(operation);
        self.value = Some(block);
        self.pending.push(Outbound::new(
            Recipient::AllServers,
            Message::PrepareRequest { ballot: self.ballot, depth: self.chain.depth() },
        ));
        Ok(())
    }

    fn send_accept_request(&mut self, operation: Operation) -> ConsensusResult<()> {
        self.reset_round();
        self.ballot = self.ballot.bumped(self.chain.depth(), self.self_id);
        let block = self.chain.generate_next(operation);
        self.value = Some(block.clone());
        self.pending.push(Outbound::new(
            Recipient::AllServers,
            Message::AcceptRequest { ballot: self.ballot, value: block, depth: self.chain.depth() },
        ));
        Ok(())
    }

    fn reset_round(&mut self) {
        self.promise_responses = 0;
        self.promise_fired = false;
        self.accept_responses = 0;
        self.accept_fired = false;
        self.highest_promised_accept_num = Ballot::ZERO;
    }

    fn send_recovery_data(&mut self, pid: u32, peer_depth: u64) {
        let our_depth = self.chain.depth();
        if our_depth == 0 || peer_depth >= our_depth - 1 {
            return;
        }
        info!(to = pid, from_depth = peer_depth, to_depth = our_depth, "sending recovery data");
        for i in peer_depth..our_depth {
            if let Some(block) = self.chain.block_at(i) {
                self.pending.push(Outbound::new(
                    Recipient::Server(pid),
                    Message::RecoveryData { depth: i + 1, block },
                ));
            }
        }
    }

    fn majority_responded(&self, responses: u32) -> bool {
        responses >= self.roster.quorum_peer_threshold()
    }

    fn handle_prepare_request(&mut self, sender_pid: u32, ballot: Ballot, depth: u64) -> ConsensusResult<()> {
        if ballot >= self.ballot {
            self.leader_id = Some(ballot.pid);
            self.ballot = ballot;
            self.pending.push(Outbound::new(
                Recipient::Server(ballot.pid),
                Message::Promise {
                    ballot,
                    accept_num: self.accept_num,
                    accept_val: self.accept_val.clone(),
                    depth: self.chain.depth(),
                },
            ));
        }
        self.send_recovery_data(sender_pid, depth);
        Ok(())
    }

    fn handle_promise(
        &mut self,
        sender_pid: u32,
        ballot: Ballot,
        accept_num: Ballot,
        accept_val: Option<Block>,
        depth: u64,
    ) -> ConsensusResult<()> {
        self.promise_responses += 1;
        if let Some(val) = accept_val {
            if accept_num > self.highest_promised_accept_num {
                self.highest_promised_accept_num = accept_num;
                self.value = Some(val);
            }
        }
        if !self.promise_fired && self.majority_responded(self.promise_responses) {
            self.promise_fired = true;
            self.leader_id = Some(ballot.pid);
            if let Some(value) = self.value.clone() {
                self.pending.push(Outbound::new(
                    Recipient::AllServers,
                    Message::AcceptRequest { ballot: self.ballot, value, depth: self.chain.depth() },
                ));
            }
        }
        self.send_recovery_data(sender_pid, depth);
        Ok(())
    }

    fn handle_accept_request(
        &mut self,
        sender_pid: u32,
        ballot: Ballot,
        value: Block,
        depth: u64,
    ) -> ConsensusResult<()> {
        if ballot >= self.ballot {
            self.accept_num = ballot;
            self.accept_val = Some(value.clone());
            self.tentative(value.clone())?;
            self.pending.push(Outbound::new(
                Recipient::Server(ballot.pid),
                Message::Accept { ballot, value, depth: self.chain.depth() },
            ));
        }
        self.send_recovery_data(sender_pid, depth);
        Ok(())
    }

    fn handle_accept(
        &mut self,
        sender_pid: u32,
        ballot: Ballot,
        value: Block,
        depth: u64,
    ) -> ConsensusResult<()> {
        self.accept_responses += 1;
        if !self.accept_fired && self.majority_responded(self.accept_responses) {
            self.accept_fired = true;
            self.pending.push(Outbound::new(
                Recipient::AllNodes,
                Message::Decide { ballot, value: value.clone() },
            ));
            self.decide(value)?;
            if let Some(req) = self.queue.pop_front() {
                self.fulfill(req);
            }
            if let Some(next) = self.queue.front() {
                let op = next.operation.clone();
                self.send_accept_request(op)?;
            }
        }
        self.send_recovery_data(sender_pid, depth);
        Ok(())
    }

    fn handle_recovery_data(&mut self, depth: u64, block: Block) -> ConsensusResult<()> {
        if self.chain.depth() == depth.saturating_sub(1) {
            info!(depth, "applying recovery data");
            self.chain.append(block)?;
            self.dict.update(&self.chain.blocks(), self.chain.depth());
            if self.is_leader() {
                if let Some(value) = self.value.clone() {
                    self.value = Some(self.chain.generate_next(value.operation));
                }
            }
        }
        Ok(())
    }

    fn fulfill(&mut self, request: QueuedRequest) {
        let message = match request.operation.op {
            OpType::Get => self.dict.get(&request.operation.key),
            OpType::Put => FULFILL_PUT_MESSAGE.to_string(),
        };
        self.pending.push(Outbound::new(
            Recipient::Client(request.client),
            Message::ClientResponse { operation: request.operation, message },
        ));
    }

    fn tentative(&mut self, mut block: Block) -> ConsensusResult<()> {
        block.tentative = true;
        if self.chain.is_tentative() {
            self.chain.update(block)?;
        } else {
            self.chain.append(block)?;
        }
        Ok(())
    }

    fn decide(&mut self, mut block: Block) -> ConsensusResult<()> {
        block.tentative = false;
        if self.chain.is_tentative() {
            self.chain.update(block)?;
        } else {
            self.chain.append(block)?;
        }
        self.dict.update(&self.chain.blocks(), self.chain.depth());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paxochain_primitives::NodeKind;

    fn roster() -> Roster {
        Roster::new(5, 3, 3201, 2201).unwrap()
    }

    fn server(pid: u32) -> ProcessId {
        ProcessId::new(NodeKind::Server, pid)
    }

    fn client(pid: u32) -> ProcessId {
        ProcessId::new(NodeKind::Client, pid)
    }

    #[test]
    fn no_leader_request_triggers_prepare_broadcast() {
        let mut replica = Replica::new(0, roster(), Blockchain::new());
        replica
            .dispatch(client(0), Message::ClientRequest {
                operation: Operation::get("k"),
                client: 0,
                force_leader: false,
            })
            .unwrap();
        let sent = replica.take_messages();
        assert_eq!(sent.len(), 1);
        match &sent[0].body {
            Message::PrepareRequest { .. } => {}
            other => panic!("expected PrepareRequest, got {other:?}"),
        }
        assert_eq!(sent[0].to, Recipient::AllServers);
    }

    #[test]
    fn request_forwarded_to_known_leader() {
        let mut replica = Replica::new(1, roster(), Blockchain::new());
        replica
            .dispatch(server(0), Message::PrepareRequest { ballot: Ballot::new(0, 1, 0), depth: 0 })
            .unwrap();
        replica.take_messages();
        replica
            .dispatch(client(2), Message::ClientRequest {
                operation: Operation::get("k"),
                client: 2,
                force_leader: false,
            })
            .unwrap();
        let sent = replica.take_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, Recipient::Server(0));
    }

    #[test]
    fn prepare_request_adopts_higher_ballot_and_replies_promise() {
        let mut replica = Replica::new(1, roster(), Blockchain::new());
        replica
            .dispatch(server(0), Message::PrepareRequest { ballot: Ballot::new(0, 1, 0), depth: 0 })
            .unwrap();
        assert_eq!(replica.leader_id(), Some(0));
        let sent = replica.take_messages();
        assert_eq!(sent.len(), 1);
        match &sent[0].body {
            Message::Promise { ballot, .. } => assert_eq!(*ballot, Ballot::new(0, 1, 0)),
            other => panic!("expected Promise, got {other:?}"),
        }
    }

    #[test]
    fn stale_prepare_request_is_ignored() {
        let mut replica = Replica::new(1, roster(), Blockchain::new());
        replica
            .dispatch(server(0), Message::PrepareRequest { ballot: Ballot::new(0, 5, 0), depth: 0 })
            .unwrap();
        replica.take_messages();
        replica
            .dispatch(server(2), Message::PrepareRequest { ballot: Ballot::new(0, 1, 2), depth: 0 })
            .unwrap();
        let sent = replica.take_messages();
        assert!(sent.is_empty(), "a stale ballot must not produce a Promise");
        assert_eq!(replica.leader_id(), Some(0));
    }

    #[test]
    fn accept_request_appends_tentative_block_and_replies_accept() {
        let mut replica = Replica::new(1, roster(), Blockchain::new());
        let value = Block::new(Operation::put("k", "v"), paxochain_primitives::HashPointer::Genesis);
        replica
            .dispatch(server(0), Message::AcceptRequest {
                ballot: Ballot::new(0, 1, 0),
                value: value.clone(),
                depth: 0,
            })
            .unwrap();
        assert_eq!(replica.depth(), 1);
        let sent = replica.take_messages();
        assert_eq!(sent.len(), 1);
        match &sent[0].body {
            Message::Accept { .. } => {}
            other => panic!("expected Accept, got {other:?}"),
        }
    }

    #[test]
    fn decide_finalizes_without_quorum_check() {
        let mut replica = Replica::new(1, roster(), Blockchain::new());
        let value = Block::new(Operation::put("k", "v"), paxochain_primitives::HashPointer::Genesis);
        replica
            .dispatch(server(0), Message::Decide { ballot: Ballot::new(0, 1, 0), value })
            .unwrap();
        assert_eq!(replica.depth(), 1);
        assert_eq!(replica.get("k"), "v");
    }

    #[test]
    fn recovery_data_only_applied_for_exactly_next_slot() {
        let mut replica = Replica::new(1, roster(), Blockchain::new());
        let far_block = Block::new(Operation::put("k", "v"), paxochain_primitives::HashPointer::Genesis);
        // depth=5 implies our depth (0) must equal depth-1=4, which is false.
        replica
            .dispatch(server(0), Message::RecoveryData { depth: 5, block: far_block })
            .unwrap();
        assert_eq!(replica.depth(), 0, "recovery data must be dropped if it doesn't fill the next slot");
    }

    #[test]
    fn recovery_data_applied_when_it_fills_next_slot() {
        let mut replica = Replica::new(1, roster(), Blockchain::new());
        let block = Block::new(Operation::put("k", "v"), paxochain_primitives::HashPointer::Genesis);
        replica
            .dispatch(server(0), Message::RecoveryData { depth: 1, block })
            .unwrap();
        assert_eq!(replica.depth(), 1);
    }

    #[test]
    fn quorum_of_accepts_decides_and_fulfills_queued_request() {
        let mut replica = Replica::new(0, roster(), Blockchain::new());
        replica
            .dispatch(client(0), Message::ClientRequest {
                operation: Operation::put("k", "v"),
                client: 0,
                force_leader: true,
            })
            .unwrap();
        // Set self as leader and fire two Accepts to reach quorum (peer
        // threshold = 2 for N=5).
        replica.leader_id = Some(0);
        replica.take_messages();
        replica
            .dispatch(server(1), Message::Accept {
                ballot: replica.ballot,
                value: replica.value.clone().unwrap(),
                depth: 0,
            })
            .unwrap();
        replica
            .dispatch(server(2), Message::Accept {
                ballot: replica.ballot,
                value: replica.value.clone().unwrap(),
                depth: 0,
            })
            .unwrap();
        let sent = replica.take_messages();
        assert!(sent.iter().any(|o| matches!(o.body, Message::Decide { .. })));
        assert!(sent.iter().any(|o| matches!(o.body, Message::ClientResponse { .. })));
    }
}
