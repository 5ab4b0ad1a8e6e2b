// Protocol Driver — building and parsing complete wire messages
//
// Combines the layout engine and the onion engine into the outward
// wrapping recursion: innermost (last relay) first, each layer's
// ciphertext becoming the next layer's payload.

pub mod assembler;

pub use assembler::{data_mac_input, establish_mac_input, AssembleError, MessageAssembler};
