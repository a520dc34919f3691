pub mod demo_handler;
