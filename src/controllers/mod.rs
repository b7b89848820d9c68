pub mod pos_controller;
