pub mod shared {
    pub mod constants;
    pub mod frame;
    pub mod latest_slot;
    pub mod mask;
    pub mod region;
    pub mod rendered_frame;
}

pub mod parameters {
    pub mod parameter_store;
}

pub mod capture {
    pub mod domain {
        pub mod frame_source;
    }
    pub mod infrastructure {
        pub mod capture_thread;
        pub mod ffmpeg_frame_source;
        pub mod still_image_source;
    }
}

pub mod detection {
    pub mod domain {
        pub mod face_detector;
        pub mod face_region_tracker;
    }
    pub mod infrastructure;
}

pub mod masking {
    pub mod domain {
        pub mod mask_compositor;
    }
}

pub mod filtering {
    pub mod domain {
        pub mod image_filter_backend;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod frame_processor;
    pub mod frame_sink;
    pub mod pipeline_logger;
    pub mod pixelate_blend;
    pub mod infrastructure {
        pub mod live_pipeline;
    }
}
