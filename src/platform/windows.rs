//! Windows virtual memory implementation using VirtualAlloc/VirtualFree.

use core::ffi::c_void;

const MEM_COMMIT: u32 = 0x1000;
const MEM_RESERVE: u32 = 0x2000;
const MEM_RELEASE: u32 = 0x8000;
const PAGE_READWRITE: u32 = 0x04;

unsafe extern "system" {
    #[link_name = "VirtualAlloc"]
    fn virtual_alloc(
        lp_address: *mut c_void,
        dw_size: usize,
        fl_allocation_type: u32,
        fl_protect: u32,
    ) -> *mut c_void;

    #[link_name = "VirtualFree"]
    fn virtual_free(lp_address: *mut c_void, dw_size: usize, dw_free_type: u32) -> i32;
}

pub unsafe fn page_alloc(size: usize) -> *mut u8 {
    let ptr = unsafe {
        virtual_alloc(
            core::ptr::null_mut(),
            size,
            MEM_COMMIT | MEM_RESERVE,
            PAGE_READWRITE,
        )
    };
    ptr as *mut u8
}

pub unsafe fn page_dealloc(ptr: *mut u8, _size: usize) {
    // MEM_RELEASE requires dwSize = 0 (releases the entire allocation)
    unsafe { virtual_free(ptr as *mut c_void, 0, MEM_RELEASE) };
}
