//! Line Details

use crate::items::{LineDetails, LineItemNode};

/// Copies descriptive, non-monetary fields from a cart line onto an order line.
///
/// Called exactly once for every order line produced, including each unit of a split leaf.
pub trait LineDetailsCopier {
    /// Fill `details` for an order line produced from `item`.
    fn copy_details(&self, item: &LineItemNode<'_>, details: &mut LineDetails);
}

/// Copies every detail field verbatim.
#[derive(Debug, Default, Clone, Copy)]
pub struct CopyLineDetails;

impl LineDetailsCopier for CopyLineDetails {
    fn copy_details(&self, item: &LineItemNode<'_>, details: &mut LineDetails) {
        details.clone_from(item.details());
    }
}

impl<F> LineDetailsCopier for F
where
    F: Fn(&LineItemNode<'_>, &mut LineDetails),
{
    fn copy_details(&self, item: &LineItemNode<'_>, details: &mut LineDetails) {
        self(item, details);
    }
}
