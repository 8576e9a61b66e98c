pub mod shared {
    pub mod constants;
    pub mod frame;
    pub mod landmark;
    pub mod model_resolver;
}

pub mod detection {
    pub mod domain {
        pub mod aspect_ratio;
        pub mod fatigue_tracker;
        pub mod index_groups;
        pub mod landmark_source;
    }
    pub mod infrastructure;
}

pub mod video {
    pub mod domain {
        pub mod frame_source;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod drowsiness_monitor;
    pub mod frame_loop;
    pub mod monitor_logger;
    pub mod session_state;
    pub mod timestamp_clock;

    #[cfg(test)]
    pub(crate) mod test_support;
}
