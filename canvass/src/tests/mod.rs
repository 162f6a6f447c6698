
// Evaluator tests
mod evaluator;
mod functions;

// Compiler tests
mod compiler;

mod session;
