use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

/// The pool of IPv4 source addresses the translator may still hand out.
///
/// Semantically a stack: [`take`](Self::take) pops the top address and
/// [`put`](Self::put) pushes one back, so a just-released address is the
/// next one reused. Together with the mapping table the pool always holds
/// exactly the host addresses derived from the bound CIDR.
#[derive(Debug, Default)]
pub(crate) struct AddressPool {
    /// Available addresses; the top of the stack is the end of the vec.
    free: Vec<Ipv4Addr>,
    /// How many host addresses the bound CIDR yielded in total.
    configured_hosts: usize,
}

impl AddressPool {
    /// Builds a pool from a CIDR, drawing at most `limit` host addresses.
    ///
    /// Host enumeration follows the classic rules: a /32 is itself the only
    /// host, a /31 has two, and anything wider skips the all-zeros and
    /// all-ones host ids. The stack is filled so that `take` hands out the
    /// numerically lowest address first.
    pub(crate) fn from_cidr(cidr: &Ipv4Net, limit: usize) -> Self {
        let mut free: Vec<Ipv4Addr> = cidr.hosts().take(limit).collect();
        let configured_hosts = free.len();
        free.reverse();
        Self {
            free,
            configured_hosts,
        }
    }

    pub(crate) fn take(&mut self) -> Option<Ipv4Addr> {
        self.free.pop()
    }

    pub(crate) fn put(&mut self, addr: Ipv4Addr) {
        self.free.push(addr);
    }

    pub(crate) fn len(&self) -> usize {
        self.free.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    /// Total host count drawn from the CIDR at bind time.
    pub(crate) fn configured_hosts(&self) -> usize {
        self.configured_hosts
    }

    /// Lowest and highest address currently pooled, for config logging.
    pub(crate) fn range(&self) -> Option<(Ipv4Addr, Ipv4Addr)> {
        Some((*self.free.last()?, *self.free.first()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slash_24_excludes_network_and_broadcast() {
        let mut pool = AddressPool::from_cidr(&"192.0.2.0/24".parse().unwrap(), 254);
        assert_eq!(pool.len(), 254);
        assert_eq!(pool.configured_hosts(), 254);
        assert_eq!(pool.take(), Some("192.0.2.1".parse().unwrap()));
        assert_eq!(pool.take(), Some("192.0.2.2".parse().unwrap()));
    }

    #[test]
    fn test_slash_31_has_two_hosts() {
        let mut pool = AddressPool::from_cidr(&"192.0.2.0/31".parse().unwrap(), 254);
        assert_eq!(pool.take(), Some("192.0.2.0".parse().unwrap()));
        assert_eq!(pool.take(), Some("192.0.2.1".parse().unwrap()));
        assert_eq!(pool.take(), None);
    }

    #[test]
    fn test_slash_32_is_its_own_host() {
        let mut pool = AddressPool::from_cidr(&"192.168.123.1/32".parse().unwrap(), 254);
        assert_eq!(pool.configured_hosts(), 1);
        assert_eq!(pool.take(), Some("192.168.123.1".parse().unwrap()));
        assert_eq!(pool.take(), None);
    }

    #[test]
    fn test_limit_caps_wide_cidrs() {
        let pool = AddressPool::from_cidr(&"10.0.0.0/8".parse().unwrap(), 254);
        assert_eq!(pool.len(), 254);
        assert_eq!(pool.configured_hosts(), 254);
    }

    #[test]
    fn test_put_is_lifo() {
        let mut pool = AddressPool::from_cidr(&"192.0.2.0/24".parse().unwrap(), 4);
        let first = pool.take().unwrap();
        let second = pool.take().unwrap();
        pool.put(first);
        assert_eq!(pool.take(), Some(first));
        pool.put(second);
        pool.put(first);
        assert_eq!(pool.take(), Some(first));
        assert_eq!(pool.take(), Some(second));
    }

    #[test]
    fn test_range() {
        let pool = AddressPool::from_cidr(&"192.0.2.0/29".parse().unwrap(), 254);
        assert_eq!(
            pool.range(),
            Some(("192.0.2.1".parse().unwrap(), "192.0.2.6".parse().unwrap()))
        );
    }
}
