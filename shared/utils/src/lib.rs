pub mod unique_queue;
