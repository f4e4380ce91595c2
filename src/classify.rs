use crate::types::Patch;
use geo::Point;

/// Returns the first patch, in iteration order, whose closed rectangle contains `point`,
/// together with the handle it was paired with.
///
/// Neighbouring patches share edges and containment is inclusive, so a point exactly on an
/// edge matches whichever neighbour comes first. That tie-break is intentional.
pub fn find_containing_patch<'a, H, I>(point: &Point<f64>, patches: I) -> Option<(H, Patch)>
where
    I: IntoIterator<Item = (H, &'a Patch)>,
{
    patches
        .into_iter()
        .find(|(_, patch)| patch.contains(point))
        .map(|(handle, patch)| (handle, *patch))
}
