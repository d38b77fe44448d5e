mod failover;
mod intake;
mod settlement;
