use crate::types::{Command, Lifespan, Side};

/// Owns the client order id sequence and queues outgoing commands until the
/// runner drains them. Id 0 is reserved for "no order".
#[derive(Debug)]
pub struct CommandEmitter {
    next_id: u64,
    outbox: Vec<Command>,
}

impl Default for CommandEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandEmitter {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            outbox: Vec::new(),
        }
    }

    fn take_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn peek_next_id(&self) -> u64 {
        self.next_id
    }

    pub fn insert_order(&mut self, side: Side, price: u64, volume: u64) -> u64 {
        let id = self.take_id();
        self.outbox.push(Command::InsertOrder {
            client_order_id: id,
            side,
            price,
            volume,
            lifespan: Lifespan::GoodForDay,
        });
        id
    }

    pub fn cancel_order(&mut self, id: u64) {
        self.outbox.push(Command::CancelOrder {
            client_order_id: id,
        });
    }

    pub fn hedge_order(&mut self, side: Side, price: u64, volume: u64) -> u64 {
        let id = self.take_id();
        self.outbox.push(Command::HedgeOrder {
            client_order_id: id,
            side,
            price,
            volume,
        });
        id
    }

    pub fn drain(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.outbox)
    }

    pub fn pending(&self) -> &[Command] {
        &self.outbox
    }
}
