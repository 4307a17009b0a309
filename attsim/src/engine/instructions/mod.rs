mod arithmetic;
mod bitwise;
mod conditional_set;
mod control_flow;
mod data_transfer;
