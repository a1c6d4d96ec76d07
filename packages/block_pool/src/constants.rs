// A poisoned lock means a panic happened mid-way through registry mutation, so the free and
// live registries may disagree about which blocks exist. We refuse to continue from that state.
pub(crate) const ERR_POISONED_LOCK: &str = "encountered poisoned lock - the block registries \
    may be inconsistent and continued execution could hand out the same block twice";
