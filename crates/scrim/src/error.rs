use ash::vk;
use thiserror::Error;

use crate::resource::ImageAccess;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceError {
    #[error("image access {0:?} has no use lowering yet")]
    UnsupportedAccess(ImageAccess),
}

///Failure of an external cache to satisfy an `acquire` call.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("vulkan error: {0}")]
    VkError(#[from] vk::Result),
    #[error("allocation failed: {0}")]
    Allocation(String),
}

#[cfg(test)]
mod test {
    use static_assertions::assert_impl_all;

    use crate::error::{CacheError, ResourceError};

    #[test]
    fn assure_send_sync() {
        assert_impl_all!(ResourceError: Send, Sync);
        assert_impl_all!(CacheError: Send, Sync);
    }
}
