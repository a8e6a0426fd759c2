// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits describing the cone
// keypoint problem: which points exist, what a labelled sample
// looks like, and how training progress is tracked.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §6 (Enums), §10 (Traits)

// The seven named cone corners and pixel coordinates
pub mod keypoint;

// A labelled image: file reference + ordered keypoints
pub mod sample;

// Early-stopping state machine and checkpoint schedule
pub mod training_state;

// Core abstractions (traits) that other layers implement
pub mod traits;
