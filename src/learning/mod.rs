// Learning: DDPG actor-critic agent, its networks and experience replay.
pub mod ddpg;
pub mod network;
pub mod replay;
