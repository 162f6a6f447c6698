mod check;
mod eval;
mod render;
mod walk;
