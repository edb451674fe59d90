pub mod ids;
pub mod job;
pub mod stored_file;
pub mod video;

pub use ids::{IdError, UserId, VideoId};
pub use job::{DeliveryMode, EncodingJob, EncodingJobMessage, MessageError, ENCODE_VIDEO_PATTERN};
pub use stored_file::{NewStoredFile, StoredFile};
pub use video::{Video, VideoStatus};
